//! Listing API endpoint constants
//!
//! Defaults for the hosted API. Every value can be overridden through the
//! daemon config so tests and mirrors can point elsewhere.

/// Token endpoint for the password-grant credential exchange
pub const TOKEN_ENDPOINT: &str = "https://www.reddit.com/api/v1/access_token";

/// Origin that authenticated API calls are resolved against
pub const API_ORIGIN: &str = "https://api.reddit.com/";

/// Origin for unauthenticated listing fetches
pub const PUBLIC_ORIGIN: &str = "https://www.reddit.com/";

/// Grant type sent in the exchange form body
pub const GRANT_TYPE: &str = "password";

/// Additional exchange attempts after the first failure
pub const CREDENTIAL_RETRIES: u32 = 5;

/// Longest issued lifetime accepted from the token endpoint, in seconds
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 24 * 60 * 60;
