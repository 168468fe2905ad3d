//! Users domain for Tandem.
//!
//! Users are created and changed in the primary store and projected into the
//! secondary store, which serves all reads through the cache-aside layer.
//! Passwords are stored as argon2id hashes and stripped from every returned
//! [`User`].

pub mod config;
mod error;
mod model;
pub mod operations;
mod password;
mod service;

pub use config::{SecurityConfig, UserStoreLabels};
pub use error::{UserError, UserResult};
pub use model::{DEFAULT_ROLE, NewUser, User, UserPatch, validate_email, validate_password_strength};
pub use operations::UserScopes;
pub use password::{PasswordHasher, is_hashed};
pub use service::{UserStores, UsersService};
