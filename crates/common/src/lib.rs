//! Common types shared by the connector crates
//!
//! - `Secret`: redacting wrapper for tokens and client secrets
//! - `redact`: scrub known secret values out of free-form text
//! - `Error`: configuration and I/O errors raised while loading config

mod error;
pub mod redact;
mod secret;

pub use error::{Error, Result};
pub use redact::redact_secrets;
pub use secret::Secret;
