use std::sync::Arc;

use chrono::Utc;

use kluster_core::{ClientId, CurrentUser, Role, ServiceError, ServiceResult, validate_request};

use crate::client::Client;
use crate::dto::{ClientRequest, ClientResponse};
use crate::errors;
use crate::repository::{ClientRepository, RepositoryError};

pub(crate) fn repository_error(err: RepositoryError) -> ServiceError {
    tracing::error!(error = %err, "business repository failure");
    errors::UNEXPECTED
}

/// The store's unique email index backs up [`ClientService::ensure_unique_email`]
/// when two writes race past the lookup.
fn save_error(err: RepositoryError) -> ServiceError {
    match err {
        RepositoryError::Duplicate(detail) => {
            tracing::debug!(detail = %detail, "client email taken by a concurrent write");
            errors::client::DUPLICATE_EMAIL
        }
        other => repository_error(other),
    }
}

fn parse_id(raw: &str) -> Result<ClientId, ServiceError> {
    raw.parse().map_err(|_| errors::client::NOT_FOUND)
}

fn clean_phone(phone: Option<String>) -> Option<String> {
    phone.map(|p| p.trim().to_string()).filter(|p| !p.is_empty())
}

/// Client management for business users.
#[derive(Clone)]
pub struct ClientService {
    clients: Arc<dyn ClientRepository>,
}

impl ClientService {
    pub fn new(clients: Arc<dyn ClientRepository>) -> Self {
        Self { clients }
    }

    pub(crate) async fn find(&self, principal: &CurrentUser, id: &ClientId) -> ServiceResult<Client> {
        self.clients
            .get(&principal.user_id, id)
            .await
            .map_err(repository_error)?
            .ok_or_else(|| errors::client::NOT_FOUND.into())
    }

    async fn ensure_unique_email(
        &self,
        principal: &CurrentUser,
        email: &str,
        except: Option<&ClientId>,
    ) -> ServiceResult<()> {
        let existing = self
            .clients
            .find_by_email(&principal.user_id, email)
            .await
            .map_err(repository_error)?;
        match existing {
            Some(c) if Some(&c.id) != except => Err(errors::client::DUPLICATE_EMAIL.into()),
            _ => Ok(()),
        }
    }

    pub async fn create(&self, principal: &CurrentUser, request: ClientRequest) -> ServiceResult<ClientResponse> {
        principal.require_role(Role::Business)?;
        validate_request(&request)?;
        self.ensure_unique_email(principal, &request.email_address, None).await?;

        let now = Utc::now();
        let client = Client {
            id: ClientId::new(),
            business_id: principal.user_id.clone(),
            first_name: request.first_name.trim().to_string(),
            last_name: request.last_name.trim().to_string(),
            email_address: request.email_address.trim().to_string(),
            address: request.address.trim().to_string(),
            phone_number: clean_phone(request.phone_number),
            created_at: now,
            updated_at: now,
        };
        self.clients.save(&client).await.map_err(save_error)?;

        tracing::info!(client_id = %client.id, business_id = %client.business_id, "client created");
        Ok(ClientResponse::from(&client))
    }

    pub async fn get(&self, principal: &CurrentUser, id: &str) -> ServiceResult<ClientResponse> {
        principal.require_role(Role::Business)?;
        let client = self.find(principal, &parse_id(id)?).await?;
        Ok(ClientResponse::from(&client))
    }

    pub async fn list(&self, principal: &CurrentUser) -> ServiceResult<Vec<ClientResponse>> {
        principal.require_role(Role::Business)?;
        let clients = self.clients.list(&principal.user_id).await.map_err(repository_error)?;
        Ok(clients.iter().map(ClientResponse::from).collect())
    }

    pub async fn update(
        &self,
        principal: &CurrentUser,
        id: &str,
        request: ClientRequest,
    ) -> ServiceResult<ClientResponse> {
        principal.require_role(Role::Business)?;
        validate_request(&request)?;

        let mut client = self.find(principal, &parse_id(id)?).await?;
        self.ensure_unique_email(principal, &request.email_address, Some(&client.id))
            .await?;

        client.first_name = request.first_name.trim().to_string();
        client.last_name = request.last_name.trim().to_string();
        client.email_address = request.email_address.trim().to_string();
        client.address = request.address.trim().to_string();
        client.phone_number = clean_phone(request.phone_number);
        client.updated_at = Utc::now();
        self.clients.save(&client).await.map_err(save_error)?;

        Ok(ClientResponse::from(&client))
    }

    pub async fn delete(&self, principal: &CurrentUser, id: &str) -> ServiceResult<()> {
        principal.require_role(Role::Business)?;
        let id = parse_id(id)?;
        if !self
            .clients
            .delete(&principal.user_id, &id)
            .await
            .map_err(repository_error)?
        {
            return Err(errors::client::NOT_FOUND.into());
        }
        tracing::info!(client_id = %id, "client deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::repository::InMemoryClientRepository;
    use kluster_core::UserId;

    /// Lookups see nothing, so every save reaches the unique index and loses.
    struct RacingRepository;

    #[async_trait]
    impl ClientRepository for RacingRepository {
        async fn save(&self, _client: &Client) -> Result<(), RepositoryError> {
            Err(RepositoryError::Duplicate("idx_clients_business_email".into()))
        }

        async fn get(&self, _owner: &UserId, _id: &ClientId) -> Result<Option<Client>, RepositoryError> {
            Ok(None)
        }

        async fn list(&self, _owner: &UserId) -> Result<Vec<Client>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn find_by_email(&self, _owner: &UserId, _email: &str) -> Result<Option<Client>, RepositoryError> {
            Ok(None)
        }

        async fn delete(&self, _owner: &UserId, _id: &ClientId) -> Result<bool, RepositoryError> {
            Ok(false)
        }
    }

    fn business() -> CurrentUser {
        CurrentUser::new(UserId::new(), "shop@example.com", Role::Business)
    }

    fn request(email: &str) -> ClientRequest {
        ClientRequest {
            first_name: "Chinua".into(),
            last_name: "Achebe".into(),
            email_address: email.into(),
            address: "12 Marina Road, Lagos".into(),
            phone_number: None,
        }
    }

    fn service() -> ClientService {
        ClientService::new(Arc::new(InMemoryClientRepository::new()))
    }

    #[tokio::test]
    async fn create_then_get() {
        let svc = service();
        let me = business();
        let created = svc.create(&me, request("chinua@example.com")).await.unwrap();
        assert!(created.id.starts_with("C-"));

        let fetched = svc.get(&me, &created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(svc.list(&me).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_fields_are_validation_errors() {
        let svc = service();
        let err = svc.create(&business(), ClientRequest::default()).await.unwrap_err();
        assert!(err.all_validation());
        assert_eq!(err.status_code(), 400);
        for code in [
            "Address.Required",
            "EmailAddress.Required",
            "FirstName.Required",
            "LastName.Required",
        ] {
            assert!(err.contains_code(code), "missing {code}");
        }
    }

    #[tokio::test]
    async fn duplicate_email_within_a_business_conflicts() {
        let svc = service();
        let me = business();
        svc.create(&me, request("chinua@example.com")).await.unwrap();

        let err = svc.create(&me, request("CHINUA@example.com")).await.unwrap_err();
        assert_eq!(err.first().code(), "Client.DuplicateEmail");

        // Another business may use the same address.
        assert!(svc.create(&business(), request("chinua@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_duplicate_rejected_by_the_store_conflicts() {
        let svc = ClientService::new(Arc::new(RacingRepository));
        let err = svc.create(&business(), request("chinua@example.com")).await.unwrap_err();
        assert_eq!(err.first().code(), "Client.DuplicateEmail");
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn other_businesses_cannot_see_the_client() {
        let svc = service();
        let created = svc.create(&business(), request("chinua@example.com")).await.unwrap();

        let err = svc.get(&business(), &created.id).await.unwrap_err();
        assert_eq!(err.first().code(), "Client.NotFound");
        assert_eq!(err.status_code(), 404);

        let err = svc.delete(&business(), &created.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn client_role_is_forbidden() {
        let svc = service();
        let client = CurrentUser::new(UserId::new(), "c@example.com", Role::Client);
        let err = svc.list(&client).await.unwrap_err();
        assert_eq!(err.first().code(), "Auth.Forbidden");
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn update_keeps_own_email_and_delete_removes() {
        let svc = service();
        let me = business();
        let created = svc.create(&me, request("chinua@example.com")).await.unwrap();

        let mut changed = request("chinua@example.com");
        changed.address = "1 Broad Street, Lagos".into();
        let updated = svc.update(&me, &created.id, changed).await.unwrap();
        assert_eq!(updated.address, "1 Broad Street, Lagos");

        svc.delete(&me, &created.id).await.unwrap();
        assert!(svc.get(&me, &created.id).await.is_err());
    }
}
