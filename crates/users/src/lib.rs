//! `kluster-users`: identity, registration, sign-in, email confirmation and
//! the logged-in user's profile.
//!
//! Storage and HTTP are outside this crate; the host supplies a [`UserStore`]
//! and a message [`Publisher`](kluster_messaging::Publisher).

pub mod dto;
pub mod errors;
pub mod lockout;
pub mod otp;
pub mod password;
pub mod service;
pub mod store;
pub mod token;
pub mod user;

pub use lockout::LockoutPolicy;
pub use otp::PendingOtp;
pub use service::UserService;
pub use store::{InMemoryUserStore, UserStore, UserStoreError};
pub use token::{Claims, IssuedToken, JwtSettings, TokenError, TokenService};
pub use user::ApplicationUser;
