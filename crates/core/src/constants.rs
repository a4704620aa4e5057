/// Application-wide limits.
pub struct AppConstants;

impl AppConstants {
    /// Maximum length of any identifier.
    pub const MAX_ID_LENGTH: usize = 450;

    pub const MIN_NAME_LENGTH: usize = 3;
    pub const MAX_NAME_LENGTH: usize = 50;

    pub const MAX_ROLE_LENGTH: usize = 10;
    pub const MAX_ADDRESS_LENGTH: usize = 200;
    pub const MAX_PRODUCT_NAME_LENGTH: usize = 100;
    pub const MAX_DESCRIPTION_LENGTH: usize = 500;

    pub const MIN_PASSWORD_LENGTH: usize = 6;
}
