// Tue Jan 15 2026 - Alex

use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SearchAlgorithm {
    #[default]
    Naive,
    BoyerMooreHorspool,
}

impl SearchAlgorithm {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "naive" => Some(Self::Naive),
            "bmh" | "horspool" | "boyer-moore-horspool" => Some(Self::BoyerMooreHorspool),
            _ => None,
        }
    }
}

impl fmt::Display for SearchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive => write!(f, "naive"),
            Self::BoyerMooreHorspool => write!(f, "bmh"),
        }
    }
}

/// First offset `>= start` where `pattern` matches, using the pattern's algorithm.
pub fn search(pattern: &Pattern, haystack: &[u8]) -> Option<usize> {
    let start = pattern.search_start_offset();
    match pattern.algorithm() {
        SearchAlgorithm::Naive => naive(pattern, haystack, start),
        SearchAlgorithm::BoyerMooreHorspool => horspool(pattern, haystack, start),
    }
}

pub fn naive(pattern: &Pattern, haystack: &[u8], start: usize) -> Option<usize> {
    let len = pattern.len();
    if len == 0 || haystack.len() < len {
        return None;
    }
    (start..=haystack.len() - len).find(|&offset| {
        pattern
            .bytes()
            .iter()
            .zip(pattern.mask())
            .enumerate()
            .all(|(i, (&b, &exact))| !exact || haystack[offset + i] == b)
    })
}

/// Skip distances keyed by the haystack byte under the pattern's last position.
pub struct BadCharTable {
    shifts: [usize; 256],
}

impl BadCharTable {
    pub fn build(pattern: &Pattern) -> Self {
        let last = pattern.len() - 1;

        // A wildcard matches anything, so no shift may carry it past the
        // window's last byte.
        let mut idx = last;
        while idx > 0 && !pattern.is_wildcard(idx) {
            idx -= 1;
        }
        let diff = if last - idx == 0 { 1 } else { last - idx };

        let mut shifts = [diff; 256];
        for i in last.saturating_sub(diff)..last {
            if !pattern.is_wildcard(i) {
                shifts[pattern.bytes()[i] as usize] = last - i;
            }
        }
        Self { shifts }
    }

    pub fn shift(&self, byte: u8) -> usize {
        self.shifts[byte as usize]
    }
}

pub fn horspool(pattern: &Pattern, haystack: &[u8], start: usize) -> Option<usize> {
    let len = pattern.len();
    if len == 0 || haystack.len() < len {
        return None;
    }

    let table = BadCharTable::build(pattern);
    let last = len - 1;
    let max_offset = haystack.len() - len;
    let bytes = pattern.bytes();
    let mut offset = start;

    while offset <= max_offset {
        let mut position = last;
        loop {
            if !pattern.is_wildcard(position) && bytes[position] != haystack[offset + position] {
                break;
            }
            if position == 0 {
                return Some(offset);
            }
            position -= 1;
        }
        offset += table.shift(haystack[offset + last]);
    }
    None
}
