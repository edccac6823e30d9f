// Tue Jan 13 2026 - Alex

use crate::pattern::{PatternError, SearchAlgorithm};
use itertools::Itertools;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// The match itself is the result.
    Function,
    /// The match holds a pointer at `deref_offset`; that pointer is the result.
    Data { deref_offset: i64 },
}

#[derive(Debug, Clone)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
    kind: PatternKind,
    search_start_offset: usize,
    algorithm: SearchAlgorithm,
    name: Option<String>,
}

impl Pattern {
    /// Builds a pattern from bytes and a mask (`true` = exact).
    pub fn new(bytes: Vec<u8>, mask: Vec<bool>) -> Result<Self, PatternError> {
        if bytes.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        if bytes.len() != mask.len() {
            return Err(PatternError::InvalidToken(format!(
                "{} bytes but {} mask entries",
                bytes.len(),
                mask.len()
            )));
        }
        Ok(Self {
            bytes,
            mask,
            kind: PatternKind::Function,
            search_start_offset: 0,
            algorithm: SearchAlgorithm::default(),
            name: None,
        })
    }

    /// Parses `"48 8B ?? ?? FF 15"`. Any token containing `?` is a wildcard.
    pub fn parse(text: &str) -> Result<Self, PatternError> {
        let mut bytes = Vec::new();
        let mut mask = Vec::new();

        for token in text.split_whitespace() {
            if token.contains('?') {
                bytes.push(0);
                mask.push(false);
                continue;
            }
            if token.len() > 2 {
                return Err(PatternError::InvalidToken(token.to_string()));
            }
            let byte = u8::from_str_radix(token, 16).map_err(|_| PatternError::InvalidToken(token.to_string()))?;
            bytes.push(byte);
            mask.push(true);
        }

        Self::new(bytes, mask)
    }

    /// A data pattern: the pointer stored at `match + deref_offset` is the result.
    pub fn parse_data(text: &str, deref_offset: i64) -> Result<Self, PatternError> {
        Ok(Self::parse(text)?.with_kind(PatternKind::Data { deref_offset }))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PatternError> {
        Self::new(bytes.to_vec(), vec![true; bytes.len()])
    }

    pub fn with_kind(mut self, kind: PatternKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_search_start(mut self, offset: usize) -> Self {
        self.search_start_offset = offset;
        self
    }

    pub fn with_algorithm(mut self, algorithm: SearchAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn search_start_offset(&self) -> usize {
        self.search_start_offset
    }

    pub fn algorithm(&self) -> SearchAlgorithm {
        self.algorithm
    }

    pub fn is_wildcard(&self, index: usize) -> bool {
        !self.mask[index]
    }

    /// True if the pattern matches `data` starting at its first byte.
    pub fn matches(&self, data: &[u8]) -> bool {
        if data.len() < self.bytes.len() {
            return false;
        }

        self.bytes
            .iter()
            .zip(self.mask.iter())
            .zip(data.iter())
            .all(|((pattern_byte, &exact), &data_byte)| !exact || *pattern_byte == data_byte)
    }

    pub fn wildcard_count(&self) -> usize {
        self.mask.iter().filter(|&&m| !m).count()
    }

    /// Canonical text: uppercase hex, `??` for wildcards.
    pub fn text(&self) -> String {
        self.bytes
            .iter()
            .zip(self.mask.iter())
            .map(|(b, &exact)| if exact { format!("{:02X}", b) } else { "??".to_string() })
            .join(" ")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref name) = self.name {
            write!(f, "{}: ", name)?;
        }
        write!(f, "{}", self.text())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes && self.mask == other.mask && self.kind == other.kind
    }
}

impl Eq for Pattern {}

pub struct PatternBuilder {
    bytes: Vec<u8>,
    mask: Vec<bool>,
    name: Option<String>,
}

impl PatternBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            mask: Vec::new(),
            name: None,
        }
    }

    pub fn byte(mut self, b: u8) -> Self {
        self.bytes.push(b);
        self.mask.push(true);
        self
    }

    pub fn bytes(mut self, bs: &[u8]) -> Self {
        for &b in bs {
            self.bytes.push(b);
            self.mask.push(true);
        }
        self
    }

    pub fn wildcards(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.bytes.push(0);
            self.mask.push(false);
        }
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<Pattern, PatternError> {
        let pattern = Pattern::new(self.bytes, self.mask)?;
        Ok(match self.name {
            Some(name) => pattern.with_name(&name),
            None => pattern,
        })
    }
}

impl Default for PatternBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonicalizes() {
        let pattern = Pattern::parse("48 8b ? ?? ff 15").unwrap();
        assert_eq!(pattern.len(), 6);
        assert_eq!(pattern.mask(), &[true, true, false, false, true, true]);
        assert_eq!(pattern.text(), "48 8B ?? ?? FF 15");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Pattern::parse(""), Err(PatternError::EmptyPattern)));
        assert!(matches!(Pattern::parse("   "), Err(PatternError::EmptyPattern)));
        assert!(matches!(Pattern::parse("48 GG"), Err(PatternError::InvalidToken(_))));
        assert!(matches!(Pattern::parse("488B"), Err(PatternError::InvalidToken(_))));
    }

    #[test]
    fn test_matches_with_wildcards() {
        let pattern = Pattern::parse("E8 ?? ?? ?? ?? 90").unwrap();
        assert!(pattern.matches(&[0xE8, 1, 2, 3, 4, 0x90, 0xCC]));
        assert!(!pattern.matches(&[0xE8, 1, 2, 3, 4, 0x91]));
        assert!(!pattern.matches(&[0xE8, 1]));
    }

    #[test]
    fn test_builder_and_data_kind() {
        let built = PatternBuilder::new().byte(0x48).wildcards(2).bytes(&[0xC3]).name("ret").build().unwrap();
        assert_eq!(built.text(), "48 ?? ?? C3");
        assert_eq!(built.to_string(), "ret: 48 ?? ?? C3");

        let data = Pattern::parse_data("48 8B 05 ?? ?? ?? ??", 3).unwrap();
        assert_eq!(data.kind(), PatternKind::Data { deref_offset: 3 });
        assert!(PatternBuilder::new().build().is_err());
    }

    #[test]
    fn test_from_bytes_all_exact() {
        let pattern = Pattern::from_bytes(&[0x00, 0xFF]).unwrap();
        assert_eq!(pattern.wildcard_count(), 0);
        assert_eq!(pattern.text(), "00 FF");
    }
}
