//! JSON files written for humans to read.

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Indentation used for every JSON file we write.
const INDENT: &[u8] = b"    ";

/// Serializes `value` with four-space indentation and a trailing newline.
pub fn to_pretty_vec<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}
