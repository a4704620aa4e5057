//! Request/response shapes for the user module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use kluster_core::validation::{
    validate_email_address, validate_first_name, validate_last_name, validate_password,
    validate_phone_number, validate_role,
};

use crate::user::ApplicationUser;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(custom(function = "validate_first_name"))]
    pub first_name: String,
    #[validate(custom(function = "validate_last_name"))]
    pub last_name: String,
    #[validate(custom(function = "validate_email_address"))]
    pub email_address: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    #[validate(custom(function = "validate_role"))]
    pub role: String,
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(custom(function = "validate_email_address"))]
    pub email_address: String,
    #[validate(length(min = 1, code = "Required", message = "Password is required."))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmEmailRequest {
    #[validate(length(min = 1, code = "Required", message = "User id is required."))]
    pub user_id: String,
    #[validate(length(equal = 6, code = "Invalid", message = "The code must be six digits."))]
    pub otp: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct ResendOtpRequest {
    #[validate(custom(function = "validate_email_address"))]
    pub email_address: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(custom(function = "validate_first_name"))]
    pub first_name: String,
    #[validate(custom(function = "validate_last_name"))]
    pub last_name: String,
    #[validate(custom(function = "validate_phone_number"))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub role: String,
    pub email_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&ApplicationUser> for UserResponse {
    fn from(user: &ApplicationUser) -> Self {
        Self {
            id: user.id.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            role: user.role.to_string(),
            email_confirmed: user.email_confirmed,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: String,
    pub email: String,
    pub email_confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}
