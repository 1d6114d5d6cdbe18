//! INI-like property map configuration
//!
//! Each `[Section]` holds `key = value` lines; `#` and `;` start comments.
//! In a multi-rank run only the coordinator reads the file; the raw bytes
//! are broadcast and every rank parses from the in-memory buffer.

use std::collections::BTreeMap;
use std::path::Path;

use crate::comm::Comm;
use crate::error::{FemError, FemResult};

/// One configuration section.
#[derive(Debug, Clone, Default)]
pub struct Section {
    entries: BTreeMap<String, String>,
}

impl Section {
    /// Looks a key up, returning `None` when absent.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    /// Looks a key up, failing with `KeyNotFound` when absent.
    pub fn require(&self, section_name: &str, key: &str) -> FemResult<&str> {
        self.query(key).ok_or_else(|| FemError::KeyNotFound {
            section: section_name.to_string(),
            key: key.to_string(),
        })
    }

    /// Parses a value, falling back to a default when the key is absent.
    pub fn parse_or<T: std::str::FromStr>(&self, key: &str, default: T) -> FemResult<T> {
        match self.query(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                FemError::InvalidArgument(format!("cannot parse value '{raw}' for key '{key}'"))
            }),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parsed configuration tree.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    sections: BTreeMap<String, Section>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> FemResult<Self> {
        let mut map = PropertyMap::new();
        let mut current: Option<String> = None;
        for (no, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = line.strip_prefix('[') {
                let name = name.strip_suffix(']').ok_or(FemError::ParseError {
                    line: no + 1,
                    msg: "unterminated section header".to_string(),
                })?;
                let name = name.trim().to_string();
                map.sections.entry(name.clone()).or_default();
                current = Some(name);
            } else if let Some((key, value)) = line.split_once('=') {
                let section = current.as_ref().ok_or(FemError::ParseError {
                    line: no + 1,
                    msg: "key outside of any section".to_string(),
                })?;
                map.sections
                    .get_mut(section)
                    .expect("section was created on header")
                    .insert(key.trim(), value.trim());
            } else {
                return Err(FemError::ParseError {
                    line: no + 1,
                    msg: format!("expected 'key = value', got '{line}'"),
                });
            }
        }
        Ok(map)
    }

    /// Coordinator reads the file; bytes are broadcast, every rank parses.
    pub fn read_synced<C: Comm>(comm: &C, path: impl AsRef<Path>, root: usize) -> FemResult<Self> {
        let mut bytes = if comm.rank() == root {
            std::fs::read(path)?
        } else {
            Vec::new()
        };
        comm.bcast_bytes(&mut bytes, root)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| FemError::FileFormat(format!("configuration is not utf-8: {e}")))?;
        Self::parse(&text)
    }

    pub fn query_section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    pub fn require_section(&self, name: &str) -> FemResult<&Section> {
        self.query_section(name)
            .ok_or_else(|| FemError::SectionNotFound(name.to_string()))
    }

    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        self.sections.entry(name.to_string()).or_default()
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(|s| s.as_str())
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(['#', ';']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sections() {
        let text = r#"
# application driver settings
[ApplicationSettings]
mesh_files = unit-square-tria.xml
delta_t = 1e-2   ; timestep

[NLCG]
type = NLCG
precon = none
"#;
        let map = PropertyMap::parse(text).unwrap();
        let app = map.query_section("ApplicationSettings").unwrap();
        assert_eq!(app.query("mesh_files"), Some("unit-square-tria.xml"));
        assert_eq!(app.parse_or("delta_t", 0.0).unwrap(), 1e-2);
        assert_eq!(
            map.query_section("NLCG").unwrap().query("type"),
            Some("NLCG")
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(PropertyMap::parse("key = value").is_err());
        assert!(PropertyMap::parse("[Broken").is_err());
        assert!(PropertyMap::parse("[S]\nnot a pair").is_err());
    }

    #[test]
    fn test_missing_lookups() {
        let map = PropertyMap::parse("[S]\na = 1").unwrap();
        assert!(map.require_section("T").is_err());
        assert!(map.query_section("S").unwrap().require("S", "b").is_err());
    }
}
