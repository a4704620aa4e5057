use std::sync::Arc;

use chrono::Utc;

use kluster_core::{CurrentUser, ProductId, Role, ServiceError, ServiceErrors, ServiceResult, validate_request};

use crate::clients::repository_error;
use crate::dto::{ProductRequest, ProductResponse};
use crate::errors;
use crate::product::Product;
use crate::repository::ProductRepository;

fn parse_id(raw: &str) -> Result<ProductId, ServiceError> {
    raw.parse().map_err(|_| errors::product::NOT_FOUND)
}

/// Field rules plus the price rule, reported together.
fn validate_product(request: &ProductRequest) -> ServiceResult<()> {
    let mut found: Vec<ServiceError> = match validate_request(request) {
        Ok(()) => Vec::new(),
        Err(e) => e.iter().cloned().collect(),
    };
    if request.price.is_negative() {
        found.push(errors::product::INVALID_PRICE);
    }
    match ServiceErrors::from_vec(found) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn clean_description(description: Option<String>) -> Option<String> {
    description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())
}

#[derive(Clone)]
pub struct ProductService {
    products: Arc<dyn ProductRepository>,
}

impl ProductService {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self { products }
    }

    async fn find(&self, principal: &CurrentUser, id: &str) -> ServiceResult<Product> {
        self.products
            .get(&principal.user_id, &parse_id(id)?)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| errors::product::NOT_FOUND.into())
    }

    pub async fn create(&self, principal: &CurrentUser, request: ProductRequest) -> ServiceResult<ProductResponse> {
        principal.require_role(Role::Business)?;
        validate_product(&request)?;

        let now = Utc::now();
        let product = Product {
            id: ProductId::new(),
            business_id: principal.user_id.clone(),
            name: request.name.trim().to_string(),
            description: clean_description(request.description),
            price: request.price,
            created_at: now,
            updated_at: now,
        };
        self.products.save(&product).await.map_err(repository_error)?;

        tracing::info!(product_id = %product.id, price = %product.price, "product created");
        Ok(ProductResponse::from(&product))
    }

    pub async fn get(&self, principal: &CurrentUser, id: &str) -> ServiceResult<ProductResponse> {
        principal.require_role(Role::Business)?;
        Ok(ProductResponse::from(&self.find(principal, id).await?))
    }

    pub async fn list(&self, principal: &CurrentUser) -> ServiceResult<Vec<ProductResponse>> {
        principal.require_role(Role::Business)?;
        let products = self.products.list(&principal.user_id).await.map_err(repository_error)?;
        Ok(products.iter().map(ProductResponse::from).collect())
    }

    pub async fn update(
        &self,
        principal: &CurrentUser,
        id: &str,
        request: ProductRequest,
    ) -> ServiceResult<ProductResponse> {
        principal.require_role(Role::Business)?;
        validate_product(&request)?;

        let mut product = self.find(principal, id).await?;
        product.name = request.name.trim().to_string();
        product.description = clean_description(request.description);
        product.price = request.price;
        product.updated_at = Utc::now();
        self.products.save(&product).await.map_err(repository_error)?;

        Ok(ProductResponse::from(&product))
    }

    pub async fn delete(&self, principal: &CurrentUser, id: &str) -> ServiceResult<()> {
        principal.require_role(Role::Business)?;
        let removed = self
            .products
            .delete(&principal.user_id, &parse_id(id)?)
            .await
            .map_err(repository_error)?;
        if !removed {
            return Err(errors::product::NOT_FOUND.into());
        }
        Ok(())
    }
}
