//! Azure Key Vault secrets over the REST API.
//!
//! Authenticates with the client-credentials flow, lists the vault's secrets
//! and fetches those carrying the application prefix. Secret names use `--`
//! where settings keys use `:` (`KlusterApi-JwtSettings--SecretKey`).

use serde::Deserialize;

use super::ConfigError;

pub const SECRET_PREFIX: &str = "KlusterApi";

const API_VERSION: &str = "7.4";
const VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";

/// `KeyVault` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeyVault {
    #[serde(rename = "Vault")]
    pub vault: String,
    #[serde(rename = "AZURE_TENANT_ID")]
    pub tenant_id: String,
    #[serde(rename = "AZURE_CLIENT_ID")]
    pub client_id: String,
    #[serde(rename = "AZURE_CLIENT_SECRET")]
    pub client_secret: String,
}

impl KeyVault {
    pub fn is_configured(&self) -> bool {
        [&self.vault, &self.tenant_id, &self.client_id, &self.client_secret]
            .iter()
            .all(|v| !v.trim().is_empty())
    }

    pub fn vault_url(&self) -> String {
        format!("https://{}.vault.azure.net", self.vault.trim())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SecretItem {
    id: String,
    #[serde(default)]
    attributes: Option<SecretAttributes>,
}

#[derive(Debug, Deserialize)]
struct SecretAttributes {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct SecretPage {
    #[serde(default)]
    value: Vec<SecretItem>,
    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

pub struct KeyVaultClient {
    http: reqwest::Client,
    settings: KeyVault,
    login_base: String,
    vault_base: String,
}

impl KeyVaultClient {
    pub fn new(http: reqwest::Client, settings: KeyVault) -> Self {
        let vault_base = settings.vault_url();
        Self {
            http,
            settings,
            login_base: LOGIN_BASE.to_string(),
            vault_base,
        }
    }

    /// Point the client at other endpoints (sovereign clouds, tests).
    pub fn with_endpoints(mut self, login_base: impl Into<String>, vault_base: impl Into<String>) -> Self {
        self.login_base = login_base.into().trim_end_matches('/').to_string();
        self.vault_base = vault_base.into().trim_end_matches('/').to_string();
        self
    }

    /// All enabled secrets named `{prefix}-...`, as `Section:Key` pairs.
    pub async fn fetch_prefixed(&self, prefix: &str) -> Result<Vec<(String, String)>, ConfigError> {
        let token = self.access_token().await?;
        let names = self.list_secret_names(&token).await?;
        let wanted = format!("{prefix}-");

        let mut secrets = Vec::new();
        for name in names.iter().filter(|n| n.starts_with(&wanted)) {
            let value = self.secret_value(&token, name).await?;
            secrets.push((settings_key(&name[wanted.len()..]), value));
        }
        Ok(secrets)
    }

    async fn access_token(&self) -> Result<String, ConfigError> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.login_base, self.settings.tenant_id);
        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.settings.client_id.as_str()),
                ("client_secret", self.settings.client_secret.as_str()),
                ("scope", VAULT_SCOPE),
            ])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| vault_error("token request failed", e))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| vault_error("invalid token response", e))?;
        Ok(token.access_token)
    }

    async fn list_secret_names(&self, token: &str) -> Result<Vec<String>, ConfigError> {
        let mut names = Vec::new();
        let mut next = Some(format!("{}/secrets?api-version={API_VERSION}", self.vault_base));

        while let Some(url) = next {
            let page: SecretPage = self
                .http
                .get(url)
                .bearer_auth(token)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|e| vault_error("listing secrets failed", e))?
                .json()
                .await
                .map_err(|e| vault_error("invalid secret listing", e))?;

            names.extend(
                page.value
                    .into_iter()
                    .filter(|item| item.attributes.as_ref().is_none_or(|a| a.enabled))
                    .filter_map(|item| item.id.rsplit('/').next().map(str::to_string)),
            );
            next = page.next_link;
        }
        Ok(names)
    }

    async fn secret_value(&self, token: &str, name: &str) -> Result<String, ConfigError> {
        let bundle: SecretBundle = self
            .http
            .get(format!("{}/secrets/{name}?api-version={API_VERSION}", self.vault_base))
            .bearer_auth(token)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| vault_error("reading secret failed", e))?
            .json()
            .await
            .map_err(|e| vault_error("invalid secret bundle", e))?;
        Ok(bundle.value)
    }
}

fn vault_error(context: &str, err: reqwest::Error) -> ConfigError {
    ConfigError::KeyVault(format!("{context}: {err}"))
}

/// `JwtSettings--SecretKey` ⇒ `JwtSettings:SecretKey`.
pub fn settings_key(secret_name: &str) -> String {
    secret_name.replace("--", ":")
}

#[cfg(test)]
mod tests {
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    use super::*;

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer vault-token")
    }

    async fn spawn_fake_azure() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let next_link = format!("{base}/secrets?api-version={API_VERSION}&page=2");

        let app = Router::new()
            .route(
                "/tenant-1/oauth2/v2.0/token",
                post(|body: String| async move {
                    if body.contains("client_id=app-1") && body.contains("grant_type=client_credentials") {
                        Ok(Json(json!({"access_token": "vault-token", "token_type": "Bearer"})))
                    } else {
                        Err(StatusCode::UNAUTHORIZED)
                    }
                }),
            )
            .route(
                "/secrets",
                get(move |headers: HeaderMap, Query(q): Query<HashMap<String, String>>| async move {
                    if !authorized(&headers) {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    let page: Value = if q.contains_key("page") {
                        json!({"value": [
                            {"id": "https://v/secrets/KlusterApi-PaystackSettings--SecretKey", "attributes": {"enabled": true}},
                            {"id": "https://v/secrets/KlusterApi-Disabled", "attributes": {"enabled": false}}
                        ]})
                    } else {
                        json!({
                            "value": [
                                {"id": "https://v/secrets/KlusterApi-JwtSettings--SecretKey"},
                                {"id": "https://v/secrets/OtherApp-Secret"}
                            ],
                            "nextLink": next_link
                        })
                    };
                    Ok(Json(page))
                }),
            )
            .route(
                "/secrets/:name",
                get(|headers: HeaderMap, Path(name): Path<String>| async move {
                    if !authorized(&headers) {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(Json(json!({"value": format!("value-of-{name}")})))
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        base
    }

    fn settings() -> KeyVault {
        KeyVault {
            vault: "kluster-vault".into(),
            tenant_id: "tenant-1".into(),
            client_id: "app-1".into(),
            client_secret: "shh".into(),
        }
    }

    #[test]
    fn secret_names_map_to_settings_keys() {
        assert_eq!(settings_key("JwtSettings--SecretKey"), "JwtSettings:SecretKey");
        assert_eq!(settings().vault_url(), "https://kluster-vault.vault.azure.net");
        assert!(settings().is_configured());
        assert!(!KeyVault::default().is_configured());
    }

    #[tokio::test]
    async fn fetches_prefixed_secrets_across_pages() {
        let base = spawn_fake_azure().await;
        let client = KeyVaultClient::new(reqwest::Client::new(), settings()).with_endpoints(base.clone(), base);

        let mut secrets = client.fetch_prefixed(SECRET_PREFIX).await.unwrap();
        secrets.sort();
        assert_eq!(
            secrets,
            vec![
                (
                    "JwtSettings:SecretKey".to_string(),
                    "value-of-KlusterApi-JwtSettings--SecretKey".to_string()
                ),
                (
                    "PaystackSettings:SecretKey".to_string(),
                    "value-of-KlusterApi-PaystackSettings--SecretKey".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn unauthorized_token_requests_fail() {
        let base = spawn_fake_azure().await;
        let mut bad = settings();
        bad.client_id = "someone-else".into();
        let client = KeyVaultClient::new(reqwest::Client::new(), bad).with_endpoints(base.clone(), base);

        assert!(matches!(client.fetch_prefixed(SECRET_PREFIX).await, Err(ConfigError::KeyVault(_))));
    }
}
