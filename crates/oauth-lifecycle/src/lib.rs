//! OAuth2 credential lifecycle for connectors
//!
//! Keeps one provider's token set usable: every authenticated call first asks
//! `CredentialManager::ensure_valid`, which refreshes the access token when it
//! has less than `SAFETY_MARGIN` left (or when its expiry is unknown).
//!
//! Flow per call:
//! 1. `CredentialManager::ensure_valid()` reads the shared `CredentialSet`
//! 2. Stale → `token::refresh_token()` POSTs the refresh_token grant
//! 3. `CredentialSet::apply_refresh()` updates the set in place
//! 4. Optional `RefreshListener` persists the new set
//! 5. Caller builds its request from the returned set
//!
//! The initial authorization (consent screen, code exchange) happens outside
//! this crate; it starts from an already-issued `CredentialSet`.

pub mod constants;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialSet, TokenState};
pub use endpoint::{BodyEncoding, RequestFields, ResponseFields, TokenEndpoint};
pub use error::{Error, Result};
pub use manager::{CredentialManager, RefreshListener, RefreshMode};
pub use token::{TokenResponse, refresh_token};
