//! `kluster-core`: shared kernel used by every module.
//!
//! Identifiers, error descriptors, validation rules and the caller identity.
//! No IO lives here.

pub mod constants;
pub mod entity;
pub mod error;
pub mod id;
pub mod memory;
pub mod principal;
pub mod settings;
pub mod validation;
pub mod value_object;

pub use constants::AppConstants;
pub use entity::{Entity, OwnedEntity};
pub use error::{ErrorKind, ServiceError, ServiceErrors, ServiceResult};
pub use id::{ClientId, IdError, InvoiceId, PaymentId, ProductId, UserId};
pub use memory::InMemoryOwnedStore;
pub use principal::{CurrentUser, Role};
pub use validation::validate_request;
pub use value_object::{Money, ValueObject};
