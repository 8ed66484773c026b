//! Upload API request signing
//!
//! Signed calls send every parameter plus `signature`, the hex SHA-1 of the
//! sorted `key=value` pairs joined with `&` and followed by the API secret.

use std::collections::BTreeMap;

use sha1::{Digest, Sha1};

/// Parameters that are sent but never signed
const UNSIGNED_PARAMS: [&str; 4] = ["file", "resource_type", "api_key", "signature"];

/// Build the string to sign from request parameters
pub fn string_to_sign(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(key, value)| !UNSIGNED_PARAMS.contains(&key.as_str()) && !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Compute the request signature for `params`
pub fn sign_params(params: &BTreeMap<String, String>, api_secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(string_to_sign(params).as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}
