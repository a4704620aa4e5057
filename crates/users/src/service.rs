//! User module application service.

use std::sync::Arc;

use chrono::Utc;

use kluster_core::{CurrentUser, Role, ServiceError, ServiceResult, UserId, validate_request};
use kluster_messaging::{Message, OtpRequested, Publisher, UserRegistered};

use crate::dto::{
    ConfirmEmailRequest, LoginRequest, RegisterRequest, RegisterResponse, ResendOtpRequest,
    TokenResponse, UpdateUserRequest, UserResponse,
};
use crate::errors;
use crate::lockout::LockoutPolicy;
use crate::otp::PendingOtp;
use crate::password::{hash_secret, verify_secret};
use crate::store::{UserStore, UserStoreError};
use crate::token::TokenService;
use crate::user::ApplicationUser;

fn store_error(err: UserStoreError) -> ServiceError {
    match err {
        UserStoreError::DuplicateEmail => errors::DUPLICATE_EMAIL,
        UserStoreError::NotFound => errors::NOT_FOUND,
        UserStoreError::Backend(reason) => {
            tracing::error!(%reason, "user store failure");
            errors::UNEXPECTED
        }
    }
}

/// Registration, sign-in and profile operations.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    tokens: TokenService,
    publisher: Publisher,
    lockout: LockoutPolicy,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, tokens: TokenService, publisher: Publisher) -> Self {
        Self {
            store,
            tokens,
            publisher,
            lockout: LockoutPolicy::default(),
        }
    }

    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    fn publish<M: Message>(&self, message: &M) {
        // The account change is already stored; a lost notification is logged only.
        if let Err(err) = self.publisher.publish(message) {
            tracing::error!(message_type = M::MESSAGE_TYPE, error = %err, "failed to publish message");
        }
    }

    /// Create an account, issue an email confirmation code and announce both.
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<RegisterResponse> {
        validate_request(&request)?;

        if self
            .store
            .find_by_email(&request.email_address)
            .await
            .map_err(store_error)?
            .is_some()
        {
            return Err(errors::DUPLICATE_EMAIL.into());
        }

        let role: Role = request
            .role
            .parse()
            .map_err(|_| ServiceError::validation("Role.Invalid", "Role must be either 'Client' or 'Business'."))?;

        let now = Utc::now();
        let password_hash = hash_secret(&request.password).map_err(|err| {
            tracing::error!(error = %err, "password hashing failed");
            errors::UNEXPECTED
        })?;

        let phone_number = request
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());

        let mut user = ApplicationUser::new(
            request.first_name,
            request.last_name,
            request.email_address,
            phone_number,
            role,
            password_hash,
            &self.lockout,
            now,
        );
        let otp = self.attach_otp(&mut user, now)?;

        self.store.insert(&user).await.map_err(store_error)?;
        tracing::info!(user_id = %user.id, role = %user.role, "user registered");

        self.publish(&UserRegistered {
            user_id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role.to_string(),
        });
        self.publish(&otp_message(&user, otp));

        Ok(RegisterResponse {
            user_id: user.id.to_string(),
            email: user.email,
            email_confirmed: user.email_confirmed,
        })
    }

    /// Check credentials and issue an access token.
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<TokenResponse> {
        validate_request(&request)?;

        let Some(mut user) = self
            .store
            .find_by_email(&request.email_address)
            .await
            .map_err(store_error)?
        else {
            return Err(errors::INVALID_CREDENTIALS.into());
        };

        let now = Utc::now();
        if user.is_locked_out(now) {
            tracing::warn!(user_id = %user.id, "login attempt on locked account");
            return Err(errors::LOCKED_OUT.into());
        }

        if !verify_secret(&request.password, &user.password_hash) {
            let locked = user.record_failed_access(&self.lockout, now);
            self.store.update(&user).await.map_err(store_error)?;
            if locked {
                tracing::warn!(user_id = %user.id, "account locked after repeated failures");
                return Err(errors::LOCKED_OUT.into());
            }
            return Err(errors::INVALID_CREDENTIALS.into());
        }

        user.reset_access_failed(now);
        self.store.update(&user).await.map_err(store_error)?;

        let issued = self.tokens.issue(&user, now).map_err(|err| {
            tracing::error!(error = %err, "token issuing failed");
            errors::UNEXPECTED
        })?;

        tracing::info!(user_id = %user.id, "user logged in");
        Ok(TokenResponse {
            access_token: issued.token,
            token_type: "Bearer",
            expires_at: issued.expires_at,
            user: UserResponse::from(&user),
        })
    }

    pub async fn confirm_email(&self, request: ConfirmEmailRequest) -> ServiceResult<()> {
        validate_request(&request)?;

        let user_id: UserId = request
            .user_id
            .parse()
            .map_err(|_| errors::NOT_FOUND)?;
        let mut user = self
            .store
            .find_by_id(&user_id)
            .await
            .map_err(store_error)?
            .ok_or(errors::NOT_FOUND)?;

        if user.email_confirmed {
            return Ok(());
        }

        let now = Utc::now();
        let valid = user
            .pending_otp
            .as_ref()
            .is_some_and(|otp| otp.matches(&request.otp, now));
        if !valid {
            return Err(errors::INVALID_OTP.into());
        }

        user.confirm_email(now);
        self.store.update(&user).await.map_err(store_error)?;
        tracing::info!(user_id = %user.id, "email confirmed");
        Ok(())
    }

    /// Issue a new code. Unknown or already confirmed addresses succeed silently.
    pub async fn resend_otp(&self, request: ResendOtpRequest) -> ServiceResult<()> {
        validate_request(&request)?;

        let Some(mut user) = self
            .store
            .find_by_email(&request.email_address)
            .await
            .map_err(store_error)?
        else {
            tracing::debug!("otp requested for unknown email");
            return Ok(());
        };
        if user.email_confirmed {
            return Ok(());
        }

        let otp = self.attach_otp(&mut user, Utc::now())?;
        self.store.update(&user).await.map_err(store_error)?;
        self.publish(&otp_message(&user, otp));
        Ok(())
    }

    pub async fn get_logged_in_user(&self, principal: &CurrentUser) -> ServiceResult<UserResponse> {
        let user = self
            .store
            .find_by_id(&principal.user_id)
            .await
            .map_err(store_error)?
            .ok_or(errors::NOT_FOUND)?;
        Ok(UserResponse::from(&user))
    }

    pub async fn update_user(&self, principal: &CurrentUser, request: UpdateUserRequest) -> ServiceResult<()> {
        validate_request(&request)?;

        let mut user = self
            .store
            .find_by_id(&principal.user_id)
            .await
            .map_err(store_error)?
            .ok_or(errors::NOT_FOUND)?;

        user.first_name = request.first_name.trim().to_string();
        user.last_name = request.last_name.trim().to_string();
        user.phone_number = request
            .phone_number
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        user.updated_at = Utc::now();

        self.store.update(&user).await.map_err(store_error)?;
        tracing::info!(user_id = %user.id, "user updated");
        Ok(())
    }

    fn attach_otp(&self, user: &mut ApplicationUser, now: chrono::DateTime<Utc>) -> Result<String, ServiceError> {
        let (code, pending) = PendingOtp::issue(now).map_err(|err| {
            tracing::error!(error = %err, "otp hashing failed");
            errors::UNEXPECTED
        })?;
        user.pending_otp = Some(pending);
        user.updated_at = now;
        Ok(code)
    }
}

fn otp_message(user: &ApplicationUser, otp: String) -> OtpRequested {
    OtpRequested {
        user_id: user.id.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        otp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryUserStore;
    use crate::token::JwtSettings;
    use kluster_messaging::{InMemoryMessageBus, MessageBus, MessageEnvelope, Subscription};

    struct Harness {
        service: UserService,
        store: Arc<InMemoryUserStore>,
        inbox: Subscription<MessageEnvelope>,
    }

    fn harness() -> Harness {
        let bus: Arc<InMemoryMessageBus<MessageEnvelope>> = Arc::new(InMemoryMessageBus::new());
        let inbox = bus.subscribe();
        let store = Arc::new(InMemoryUserStore::new());
        let tokens = TokenService::new(&JwtSettings {
            secret_key: "unit-test-secret-key-that-is-long-enough".into(),
            issuer: "kluster".into(),
            audience: "kluster".into(),
            expiry_minutes: 60,
        })
        .unwrap();
        let service = UserService::new(store.clone(), tokens, Publisher::new(bus));
        Harness { service, store, inbox }
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email_address: email.into(),
            password: "Passw0rd!".into(),
            role: "Business".into(),
            phone_number: None,
        }
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email_address: email.into(),
            password: password.into(),
        }
    }

    fn last_otp(inbox: &mut Subscription<MessageEnvelope>) -> String {
        let mut otp = None;
        while let Ok(envelope) = inbox.try_recv() {
            if envelope.message_type() == OtpRequested::MESSAGE_TYPE {
                otp = Some(envelope.decode::<OtpRequested>().unwrap().otp);
            }
        }
        otp.expect("an OtpRequested message")
    }

    #[tokio::test]
    async fn register_publishes_registration_and_otp() {
        let mut h = harness();
        let created = h.service.register(register_request("ada@example.com")).await.unwrap();
        assert!(created.user_id.starts_with("U-"));
        assert!(!created.email_confirmed);

        let first = h.inbox.try_recv().unwrap();
        assert_eq!(first.message_type(), UserRegistered::MESSAGE_TYPE);
        let second = h.inbox.try_recv().unwrap();
        assert_eq!(second.message_type(), OtpRequested::MESSAGE_TYPE);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict_regardless_of_case() {
        let h = harness();
        h.service.register(register_request("ada@example.com")).await.unwrap();

        let err = h.service.register(register_request("ADA@example.com")).await.unwrap_err();
        assert_eq!(err.first().code(), "User.DuplicateEmail");
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn invalid_registration_reports_every_field() {
        let h = harness();
        let err = h
            .service
            .register(RegisterRequest {
                first_name: "Al".into(),
                password: "weak".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(err.all_validation());
        for code in [
            "FirstName.TooShort",
            "LastName.Required",
            "EmailAddress.Required",
            "Password.TooShort",
            "Role.Required",
        ] {
            assert!(err.contains_code(code), "missing {code}");
        }
    }

    #[tokio::test]
    async fn login_issues_a_token_for_the_user() {
        let h = harness();
        h.service.register(register_request("ada@example.com")).await.unwrap();

        let token = h.service.login(login("ada@example.com", "Passw0rd!")).await.unwrap();
        let principal = h.service.tokens().authenticate(&token.access_token).unwrap();
        assert_eq!(principal.role, Role::Business);
        assert_eq!(token.user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn five_failures_lock_the_account_until_the_window_passes() {
        let h = harness();
        h.service.register(register_request("ada@example.com")).await.unwrap();

        for _ in 0..4 {
            let err = h.service.login(login("ada@example.com", "Wrong1!")).await.unwrap_err();
            assert_eq!(err.first().code(), "User.InvalidCredentials");
        }
        let err = h.service.login(login("ada@example.com", "Wrong1!")).await.unwrap_err();
        assert_eq!(err.first().code(), "User.LockedOut");

        // Correct password is still refused while locked.
        let err = h.service.login(login("ada@example.com", "Passw0rd!")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        // Move the lockout into the past.
        let mut user = h.store.find_by_email("ada@example.com").await.unwrap().unwrap();
        user.lockout_end = Some(Utc::now() - chrono::Duration::seconds(1));
        h.store.update(&user).await.unwrap();

        assert!(h.service.login(login("ada@example.com", "Passw0rd!")).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() {
        let h = harness();
        let err = h.service.login(login("ghost@example.com", "Passw0rd!")).await.unwrap_err();
        assert_eq!(err.first().code(), "User.InvalidCredentials");
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn confirm_email_accepts_the_mailed_code_once() {
        let mut h = harness();
        let created = h.service.register(register_request("ada@example.com")).await.unwrap();
        let otp = last_otp(&mut h.inbox);

        let wrong = if otp == "111111" { "222222" } else { "111111" };
        let err = h
            .service
            .confirm_email(ConfirmEmailRequest {
                user_id: created.user_id.clone(),
                otp: wrong.into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.first().code(), "User.InvalidOtp");

        h.service
            .confirm_email(ConfirmEmailRequest {
                user_id: created.user_id.clone(),
                otp,
            })
            .await
            .unwrap();

        let user = h.store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert!(user.email_confirmed);
        assert!(user.pending_otp.is_none());
    }

    #[tokio::test]
    async fn resend_otp_is_silent_for_unknown_email() {
        let mut h = harness();
        h.service
            .resend_otp(ResendOtpRequest {
                email_address: "nobody@example.com".into(),
            })
            .await
            .unwrap();
        assert!(h.inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn resend_otp_replaces_the_pending_code() {
        let mut h = harness();
        h.service.register(register_request("ada@example.com")).await.unwrap();
        let before = h.store.find_by_email("ada@example.com").await.unwrap().unwrap().pending_otp;
        let _ = last_otp(&mut h.inbox);

        h.service
            .resend_otp(ResendOtpRequest {
                email_address: "ada@example.com".into(),
            })
            .await
            .unwrap();

        let after = h.store.find_by_email("ada@example.com").await.unwrap().unwrap().pending_otp;
        assert_ne!(before, after);
        let _ = last_otp(&mut h.inbox);
    }

    #[tokio::test]
    async fn get_and_update_the_logged_in_user() {
        let h = harness();
        let created = h.service.register(register_request("ada@example.com")).await.unwrap();
        let principal = CurrentUser::new(created.user_id.parse().unwrap(), "ada@example.com", Role::Business);

        h.service
            .update_user(
                &principal,
                UpdateUserRequest {
                    first_name: "Augusta".into(),
                    last_name: "King".into(),
                    phone_number: Some("+234 803 123 4567".into()),
                },
            )
            .await
            .unwrap();

        let me = h.service.get_logged_in_user(&principal).await.unwrap();
        assert_eq!(me.first_name, "Augusta");
        assert_eq!(me.last_name, "King");
        assert_eq!(me.phone_number.as_deref(), Some("+234 803 123 4567"));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let h = harness();
        let principal = CurrentUser::new(UserId::new(), "ghost@example.com", Role::Client);
        let err = h.service.get_logged_in_user(&principal).await.unwrap_err();
        assert_eq!(err.first().code(), "User.NotFound");
        assert_eq!(err.status_code(), 404);
    }
}
