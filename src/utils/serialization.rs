//! JSON encoding for human-readable documents.
//!
//! Documents are written with four-space indentation and a trailing newline.
//! Key order is stable as long as the serialized types use declaration-
//! ordered structs and `BTreeMap`s.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Indentation used for every document.
const INDENT: &[u8] = b"    ";

/// Serialize `data` as indented JSON followed by a newline.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_pretty_json<T: Serialize>(data: &T) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut serializer = Serializer::with_formatter(&mut out, formatter);
    data.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

/// Deserialize a JSON document.
///
/// # Errors
///
/// Returns an error if the bytes are not valid JSON for `T`.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    serde_json::from_slice(bytes)
}
