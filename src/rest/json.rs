//! Small JSON helpers shared by the resource handlers

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Response;
use crate::{Error, Result};

/// Parse a body holding a single JSON string
///
/// # Errors
///
/// Returns [`Error::InvalidArgs`] if the body is not a JSON string.
pub fn string_body(body: &[u8]) -> Result<String> {
    serde_json::from_slice(body).map_err(|_| Error::invalid_args("body must be a JSON string"))
}

/// Parse a JSON body into `T`
///
/// # Errors
///
/// Returns [`Error::InvalidArgs`] if the body does not match `T`.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::invalid_args(e.to_string()))
}

/// Serialize `value` into the response body
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn set_json<T: Serialize + ?Sized>(response: &mut Response, value: &T) -> Result<()> {
    response.set_body(serde_json::to_string(value)?);
    Ok(())
}

/// Write `bytes` as a JSON string of uppercase hex
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn set_hex(response: &mut Response, bytes: &[u8]) -> Result<()> {
    set_json(response, &hex::encode_upper(bytes))
}

/// Decode exactly `N` bytes of hex
///
/// # Errors
///
/// Returns [`Error::InvalidArgs`] for bad digits or the wrong length.
pub fn hex_exact<const N: usize>(text: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(text).map_err(|e| Error::invalid_args(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| Error::invalid_args(format!("expected {N} hex-encoded bytes")))
}
