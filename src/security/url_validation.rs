//! Outbound URL validation for the script HTTP capability.

use crate::error::CapabilityError;
use url::Url;

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Parse `raw` and accept only `http`/`https` URLs with a host.
///
/// Runs before any network activity, so a rejected URL never causes I/O.
pub fn validate_script_url(raw: &str) -> Result<Url, CapabilityError> {
    let parsed = Url::parse(raw).map_err(|e| CapabilityError::InvalidUrl(format!("{raw}: {e}")))?;
    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(CapabilityError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(CapabilityError::InvalidUrl(format!("{raw}: missing host")));
    }
    Ok(parsed)
}
