//! Credential lifecycle for the listing API
//!
//! Exchanges the account password for a short-lived bearer token and caches
//! it until half of its issued lifetime has passed. Callers only ever ask for
//! `CredentialManager::get_credential()`; refresh happens on demand.
//!
//! Credential flow:
//! 1. First authenticated request calls `get_credential()` (cache empty)
//! 2. `token::exchange_password()` posts the password grant
//! 3. Result cached as `Credential` with `expires_at = now + expires_in / 2`
//! 4. Later calls return the cached value until `expires_at`, then repeat 2-3

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, CredentialManager};
pub use error::{Error, Result};
pub use token::{AppIdentity, TokenResponse, exchange_password};
