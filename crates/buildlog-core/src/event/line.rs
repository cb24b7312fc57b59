//! Serde representation for raw output lines.
//!
//! Lines that are valid UTF-8 serialize as JSON strings so recorded streams
//! stay readable; anything else falls back to an array of bytes. Both forms
//! are accepted on input.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum LineRepr {
    Text(String),
    Raw(Vec<u8>),
}

pub fn serialize<S>(line: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match std::str::from_utf8(line) {
        Ok(text) => serializer.serialize_str(text),
        Err(_) => line.serialize(serializer),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LineRepr::deserialize(deserializer)? {
        LineRepr::Text(text) => text.into_bytes(),
        LineRepr::Raw(bytes) => bytes,
    })
}
