//! Client for the hosted backend store: auth sessions, object storage and
//! the saved-image metadata table, all over REST.

pub mod auth;
pub mod client;
pub mod error;
pub mod images;

pub use auth::{AuthError, AuthErrorKind};
pub use client::{StoreClient, StoreConfig};
pub use error::StoreError;
pub use images::{NewSavedImage, SavedImage};
