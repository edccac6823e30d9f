// Wed Jan 15 2026 - Alex

use crate::memory::{Address, MemoryError, MemoryRegion, ModuleInfo, Protection};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// One line of `/proc/<pid>/maps`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapsEntry {
    pub start: u64,
    pub end: u64,
    pub protection: Protection,
    pub offset: u64,
    pub path: Option<String>,
}

impl MapsEntry {
    // start-end perms offset dev inode [path]
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let range = fields.next()?;
        let perms = fields.next()?;
        let offset = fields.next()?;
        let _dev = fields.next()?;
        let _inode = fields.next()?;
        let path = fields.collect::<Vec<_>>().join(" ");

        let (start, end) = range.split_once('-')?;
        Some(Self {
            start: u64::from_str_radix(start, 16).ok()?,
            end: u64::from_str_radix(end, 16).ok()?,
            protection: Protection::from_maps_perms(perms),
            offset: u64::from_str_radix(offset, 16).ok()?,
            path: if path.is_empty() { None } else { Some(path) },
        })
    }

    pub fn region(&self) -> MemoryRegion {
        MemoryRegion::new(Address::new(self.start), (self.end - self.start) as usize, self.protection)
    }

    /// File-backed mappings only; `[heap]`, `[stack]` and anonymous maps are skipped.
    pub fn file_path(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| p.starts_with('/'))
    }
}

pub fn parse_maps(contents: &str) -> Vec<MapsEntry> {
    contents.lines().filter_map(MapsEntry::parse).collect()
}

pub fn read_maps(pid: Option<u32>) -> Result<Vec<MapsEntry>, MemoryError> {
    let path = match pid {
        Some(pid) => format!("/proc/{}/maps", pid),
        None => "/proc/self/maps".to_string(),
    };
    let contents = fs::read_to_string(&path)?;
    Ok(parse_maps(&contents))
}

/// Folds the mappings of each file into one module spanning all of them.
pub fn modules_from_maps(entries: &[MapsEntry]) -> Vec<ModuleInfo> {
    let mut spans: IndexMap<&str, (u64, u64)> = IndexMap::new();

    for entry in entries {
        let Some(path) = entry.file_path() else {
            continue;
        };
        let span = spans.entry(path).or_insert((entry.start, entry.end));
        span.0 = span.0.min(entry.start);
        span.1 = span.1.max(entry.end);
    }

    spans
        .into_iter()
        .map(|(path, (start, end))| {
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string());
            ModuleInfo::new(&name, path, Address::new(start), (end - start) as usize)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
55d0c8a00000-55d0c8a02000 r--p 00000000 08:01 1048602                    /usr/bin/cat
55d0c8a02000-55d0c8a07000 r-xp 00002000 08:01 1048602                    /usr/bin/cat
55d0c8a0c000-55d0c8a0d000 rw-p 0000b000 08:01 1048602                    /usr/bin/cat
55d0c9b1e000-55d0c9b3f000 rw-p 00000000 00:00 0                          [heap]
7f1e2c000000-7f1e2c021000 rw-p 00000000 00:00 0
7f1e2d400000-7f1e2d428000 r--p 00000000 08:01 1057003                    /usr/lib/x86_64-linux-gnu/libc.so.6
7f1e2d428000-7f1e2d5bd000 r-xp 00028000 08:01 1057003                    /usr/lib/x86_64-linux-gnu/libc.so.6
";

    #[test]
    fn test_parse_line() {
        let entry = MapsEntry::parse(SAMPLE.lines().nth(1).unwrap()).unwrap();
        assert_eq!(entry.start, 0x55d0c8a02000);
        assert_eq!(entry.end, 0x55d0c8a07000);
        assert_eq!(entry.protection, Protection::ReadExecute);
        assert_eq!(entry.offset, 0x2000);
        assert_eq!(entry.file_path(), Some("/usr/bin/cat"));
    }

    #[test]
    fn test_anonymous_and_pseudo_paths() {
        let entries = parse_maps(SAMPLE);
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[3].path.as_deref(), Some("[heap]"));
        assert_eq!(entries[3].file_path(), None);
        assert_eq!(entries[4].path, None);
    }

    #[test]
    fn test_modules_fold_mappings() {
        let modules = modules_from_maps(&parse_maps(SAMPLE));
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].name, "cat");
        assert_eq!(modules[0].base, Address::new(0x55d0c8a00000));
        assert_eq!(modules[0].size, 0xd000);
        assert_eq!(modules[1].name, "libc.so.6");
        assert_eq!(modules[1].size, 0x1bd000);
    }
}
