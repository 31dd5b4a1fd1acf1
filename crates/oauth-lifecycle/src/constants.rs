//! OAuth lifecycle constants
//!
//! Fixed values shared by every provider. Per-provider values (token URL,
//! field names, body encoding) live in `TokenEndpoint`.

use std::time::Duration;

/// A token with less than this much lifetime left is refreshed before use.
/// Covers the latency of the API call that follows the check.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Token type assumed when neither the stored set nor the token response
/// names one.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Grant type sent on every refresh request.
pub const REFRESH_GRANT_TYPE: &str = "refresh_token";

/// Upper bound on a single token endpoint round trip.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);
