//! Common types for the walkup Spotify access layer

mod config;
mod error;
mod secret;

pub use config::{AuthSettings, CatalogSettings, Config};
pub use error::{Error, Result};
pub use secret::Secret;
