//! Text encoding used to turn captured job output into console text.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{OutputError, Result};

/// Encoding applied when decoding buffered output for the console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputEncoding {
    /// Strict UTF-8. Invalid sequences fail the emission for that job.
    #[default]
    Utf8,
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    LossyUtf8,
}

impl OutputEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => "utf-8",
            OutputEncoding::LossyUtf8 => "lossy utf-8",
        }
    }

    /// Decode the output of `job`.
    pub fn decode<'a>(&self, job: &str, bytes: &'a [u8]) -> Result<Cow<'a, str>> {
        match self {
            OutputEncoding::Utf8 => std::str::from_utf8(bytes).map(Cow::Borrowed).map_err(|source| {
                OutputError::Decode {
                    job: job.to_string(),
                    encoding: self.name(),
                    source,
                }
            }),
            OutputEncoding::LossyUtf8 => Ok(String::from_utf8_lossy(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_utf8_decodes_multibyte() {
        let text = OutputEncoding::Utf8.decode("pkg", "grüß\n".as_bytes()).unwrap();
        assert_eq!(text, "grüß\n");
    }

    #[test]
    fn test_strict_utf8_rejects_invalid() {
        let err = OutputEncoding::Utf8.decode("pkg", b"ok\xff\n").unwrap_err();
        match err {
            OutputError::Decode { job, .. } => assert_eq!(job, "pkg"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn test_lossy_utf8_replaces_invalid() {
        let text = OutputEncoding::LossyUtf8.decode("pkg", b"ok\xff\n").unwrap();
        assert_eq!(text, "ok\u{fffd}\n");
    }
}
