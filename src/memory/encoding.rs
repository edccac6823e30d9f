// Wed Jan 15 2026 - Alex

use encoding_rs::Encoding;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    Utf8,
    Utf16Le,
    Ascii,
    /// Any code page known to `encoding_rs`, e.g. `encoding_rs::SHIFT_JIS`.
    CodePage(&'static Encoding),
}

impl StringEncoding {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Self::Utf8),
            "utf16" | "utf-16" | "utf-16le" | "unicode" => Some(Self::Utf16Le),
            "ascii" => Some(Self::Ascii),
            other => Encoding::for_label(other.as_bytes()).map(Self::CodePage),
        }
    }

    pub fn terminator(&self) -> &'static [u8] {
        match self {
            Self::Utf16Le => &[0, 0],
            _ => &[0],
        }
    }

    /// Decodes `bytes` and cuts the result at the first NUL character.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut text = match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '?' })
                .collect(),
            Self::Utf16Le => {
                let even = bytes.len() & !1;
                let (decoded, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(&bytes[..even]);
                decoded.into_owned()
            }
            Self::CodePage(encoding) => {
                let (decoded, _) = encoding.decode_without_bom_handling(bytes);
                decoded.into_owned()
            }
        };

        if let Some(end) = text.find('\0') {
            text.truncate(end);
        }
        text
    }

    /// Encodes `text`, appending a terminator unless it already ends in one.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut bytes = match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            // encoding_rs only encodes into ASCII-compatible encodings
            Self::Utf16Le => text.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect(),
            Self::CodePage(encoding) => {
                let (encoded, _, _) = encoding.encode(text);
                encoded.into_owned()
            }
        };

        if !text.ends_with('\0') {
            bytes.extend_from_slice(self.terminator());
        }
        bytes
    }
}

impl Default for StringEncoding {
    fn default() -> Self {
        Self::Utf8
    }
}

impl fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => write!(f, "UTF-8"),
            Self::Utf16Le => write!(f, "UTF-16LE"),
            Self::Ascii => write!(f, "ASCII"),
            Self::CodePage(encoding) => write!(f, "{}", encoding.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_truncates_at_nul() {
        assert_eq!(StringEncoding::Utf8.decode(b"Player\0garbage"), "Player");
        assert_eq!(StringEncoding::Utf16Le.decode(&[b'h', 0, b'i', 0, 0, 0, b'x', 0]), "hi");
    }

    #[test]
    fn test_encode_appends_terminator_once() {
        assert_eq!(StringEncoding::Utf8.encode("ab"), b"ab\0".to_vec());
        assert_eq!(StringEncoding::Utf8.encode("ab\0"), b"ab\0".to_vec());
        assert_eq!(StringEncoding::Utf16Le.encode("a"), vec![b'a', 0, 0, 0]);
    }

    #[test]
    fn test_code_page_round_trip() {
        let sjis = StringEncoding::from_label("shift_jis").unwrap();
        let bytes = sjis.encode("ビートマニア");
        assert_eq!(sjis.decode(&bytes), "ビートマニア");
    }

    #[test]
    fn test_ascii_replaces_non_ascii() {
        assert_eq!(StringEncoding::Ascii.encode("é"), b"?\0".to_vec());
    }
}
