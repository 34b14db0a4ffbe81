//! Charset decoding and encoding of file content

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Supported file charsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8, the default
    #[default]
    #[serde(rename = "UTF-8")]
    Utf8,
    /// ISO-8859-1, one byte per char, `U+0000..=U+00FF`
    #[serde(rename = "ISO-8859-1")]
    Latin1,
}

impl Encoding {
    /// Parse a charset name, case-insensitive, accepting common aliases
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Ok(Self::Latin1),
            other => Err(Error::Config(format!("unsupported encoding '{}'", other))),
        }
    }

    /// Canonical charset name
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode raw file bytes. Malformed input is an [`Error::Encoding`].
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Result<Cow<'a, str>> {
        match self {
            Self::Utf8 => match std::str::from_utf8(bytes) {
                Ok(text) => Ok(Cow::Borrowed(text)),
                Err(err) => {
                    let (line, column) = line_and_column(bytes, err.valid_up_to());
                    Err(Error::Encoding(format!(
                        "Encoding error! Spotcheck uses UTF-8 by default. \
                         Malformed input at line {} column {}",
                        line, column
                    )))
                }
            },
            Self::Latin1 => {
                // ASCII maps 1:1
                if bytes.is_ascii() {
                    if let Ok(text) = std::str::from_utf8(bytes) {
                        return Ok(Cow::Borrowed(text));
                    }
                }
                Ok(Cow::Owned(bytes.iter().map(|&b| b as char).collect()))
            }
        }
    }

    /// Encode text. Characters the charset cannot represent are an [`Error::Encoding`].
    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>> {
        match self {
            Self::Utf8 => Ok(Cow::Borrowed(text.as_bytes())),
            Self::Latin1 => {
                if text.is_ascii() {
                    return Ok(Cow::Borrowed(text.as_bytes()));
                }
                let mut out = Vec::with_capacity(text.len());
                for (offset, ch) in text.char_indices() {
                    let code = ch as u32;
                    if code > 0xFF {
                        let (line, column) = line_and_column(text.as_bytes(), offset);
                        return Err(Error::Encoding(format!(
                            "Character '{}' cannot be encoded as ISO-8859-1 at line {} column {}",
                            ch, line, column
                        )));
                    }
                    out.push(code as u8);
                }
                Ok(Cow::Owned(out))
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 1-based line and column of byte `offset`
fn line_and_column(bytes: &[u8], offset: usize) -> (usize, usize) {
    let before = &bytes[..offset.min(bytes.len())];
    let line = memchr::memchr_iter(b'\n', before).count() + 1;
    let column = match memchr::memrchr(b'\n', before) {
        Some(idx) => offset - idx,
        None => offset + 1,
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Encoding::parse("UTF-8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::parse("utf8").unwrap(), Encoding::Utf8);
        assert_eq!(Encoding::parse("ISO-8859-1").unwrap(), Encoding::Latin1);
        assert_eq!(Encoding::parse("latin1").unwrap(), Encoding::Latin1);
        assert_matches!(Encoding::parse("EBCDIC"), Err(Error::Config(_)));
    }

    #[test]
    fn test_utf8_error_names_position() {
        let bytes = b"ok\nab\xffcd";
        let err = Encoding::Utf8.decode(bytes).unwrap_err();
        assert_matches!(err, Error::Encoding(_));
        let msg = err.to_string();
        assert!(msg.contains("line 2"), "{}", msg);
        assert!(msg.contains("column 3"), "{}", msg);
    }

    #[test]
    fn test_latin1_decodes_high_bytes() {
        let decoded = Encoding::Latin1.decode(b"caf\xe9").unwrap();
        assert_eq!(decoded, "café");
        let encoded = Encoding::Latin1.encode(&decoded).unwrap();
        assert_eq!(&*encoded, b"caf\xe9");
    }

    #[test]
    fn test_latin1_rejects_wide_chars() {
        let err = Encoding::Latin1.encode("a\n€").unwrap_err();
        assert!(err.to_string().contains("line 2 column 1"), "{}", err);
    }

    #[test]
    fn test_line_and_column() {
        assert_eq!(line_and_column(b"abc", 0), (1, 1));
        assert_eq!(line_and_column(b"abc", 2), (1, 3));
        assert_eq!(line_and_column(b"a\nbc", 3), (2, 2));
    }
}
