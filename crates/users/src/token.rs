//! JWT issuing and validation (HS256).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kluster_core::{CurrentUser, Role, UserId};

use crate::user::ApplicationUser;

fn default_expiry_minutes() -> i64 {
    60
}

/// `JwtSettings` configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JwtSettings {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default = "default_expiry_minutes", deserialize_with = "kluster_core::settings::from_text")]
    pub expiry_minutes: i64,
}

/// Claims carried by access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub given_name: String,
    pub family_name: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// Turn validated claims into the caller identity used by services.
    pub fn to_current_user(&self) -> Result<CurrentUser, TokenError> {
        let user_id: UserId = self.sub.parse().map_err(|_| TokenError::MalformedClaims("sub"))?;
        let role: Role = self.role.parse().map_err(|_| TokenError::MalformedClaims("role"))?;
        Ok(CurrentUser::new(user_id, self.email.clone(), role))
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("JwtSettings:{0} is not configured")]
    MissingSetting(&'static str),

    #[error("token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("token claim `{0}` is malformed")]
    MalformedClaims(&'static str),
}

/// A freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenService {
    issuer: String,
    audience: String,
    lifetime: Duration,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Fails when the secret, issuer or audience is missing.
    pub fn new(settings: &JwtSettings) -> Result<Self, TokenError> {
        if settings.secret_key.trim().is_empty() {
            return Err(TokenError::MissingSetting("SecretKey"));
        }
        if settings.issuer.trim().is_empty() {
            return Err(TokenError::MissingSetting("Issuer"));
        }
        if settings.audience.trim().is_empty() {
            return Err(TokenError::MissingSetting("Audience"));
        }

        let secret = settings.secret_key.as_bytes();
        Ok(Self {
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
            lifetime: Duration::minutes(settings.expiry_minutes.max(1)),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    pub fn issue(&self, user: &ApplicationUser, now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let expires_at = now + self.lifetime;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            given_name: user.first_name.clone(),
            family_name: user.last_name.clone(),
            role: user.role.as_str().to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(IssuedToken { token, expires_at })
    }

    /// Verify signature, issuer, audience and lifetime.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn authenticate(&self, token: &str) -> Result<CurrentUser, TokenError> {
        self.validate(token)?.to_current_user()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockout::LockoutPolicy;

    fn settings() -> JwtSettings {
        JwtSettings {
            secret_key: "a-very-long-test-secret-key-for-hs256".into(),
            issuer: "kluster".into(),
            audience: "kluster-clients".into(),
            expiry_minutes: 30,
        }
    }

    fn user() -> ApplicationUser {
        ApplicationUser::new(
            "Grace",
            "Hopper",
            "grace@example.com",
            None,
            Role::Business,
            "hash".into(),
            &LockoutPolicy::default(),
            Utc::now(),
        )
    }

    #[test]
    fn issued_token_round_trips_to_current_user() {
        let tokens = TokenService::new(&settings()).unwrap();
        let user = user();
        let issued = tokens.issue(&user, Utc::now()).unwrap();

        let current = tokens.authenticate(&issued.token).unwrap();
        assert_eq!(current.user_id, user.id);
        assert_eq!(current.role, Role::Business);
        assert_eq!(current.email, "grace@example.com");
    }

    #[test]
    fn wrong_audience_or_issuer_is_rejected() {
        let tokens = TokenService::new(&settings()).unwrap();
        let issued = tokens.issue(&user(), Utc::now()).unwrap();

        let other_aud = TokenService::new(&JwtSettings {
            audience: "someone-else".into(),
            ..settings()
        })
        .unwrap();
        assert!(other_aud.validate(&issued.token).is_err());

        let other_iss = TokenService::new(&JwtSettings {
            issuer: "impostor".into(),
            ..settings()
        })
        .unwrap();
        assert!(other_iss.validate(&issued.token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new(&settings()).unwrap();
        let issued = tokens.issue(&user(), Utc::now() - Duration::hours(2)).unwrap();
        assert!(matches!(tokens.validate(&issued.token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn missing_settings_fail_fast() {
        let err = TokenService::new(&JwtSettings {
            audience: String::new(),
            ..settings()
        })
        .unwrap_err();
        assert!(matches!(err, TokenError::MissingSetting("Audience")));
    }
}
