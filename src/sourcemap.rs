//! # Source Map Module
//!
//! Modello della source map (revisione 3) e lookup delle posizioni originali.
//!
//! ## Responsabilità:
//! - `SourceMap`: struttura serializzabile che viaggia tra asset, chain e worker
//! - `SourceMap::is_valid()`: predicato di validità usato in fase di dispatch
//! - `SourceMapConsumer`: decodifica i `mappings` VLQ e risponde a
//!   `original_position_for(line, column)`
//!
//! ## Convenzioni:
//! - Le linee sono 1-based, le colonne 0-based (come nei minifier)
//! - Il lookup usa il bias "greatest lower bound": la mapping con colonna
//!   generata più grande `<= column` sulla stessa linea

use crate::error::MinimizeError;
use serde::{Deserialize, Serialize};

/// A revision 3 source map as carried alongside an asset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mappings: Option<String>,
}

impl SourceMap {
    /// Create a version 3 map for the given sources and encoded mappings
    pub fn new(sources: Vec<String>, mappings: impl Into<String>) -> Self {
        Self {
            version: Some(3),
            sources,
            mappings: Some(mappings.into()),
            ..Self::default()
        }
    }

    /// A map is usable when it has a version, at least one source and a mappings string
    pub fn is_valid(&self) -> bool {
        self.version.is_some() && !self.sources.is_empty() && self.mappings.is_some()
    }

    pub fn from_json(json: &str) -> Result<Self, MinimizeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, MinimizeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Resolve a `sources` entry against `sourceRoot`
    fn resolve_source(&self, source: &str) -> String {
        match self.source_root.as_deref() {
            Some(root) if !root.is_empty() && !is_absolute_source(source) => {
                format!("{}/{}", root.trim_end_matches('/'), source)
            }
            _ => source.to_string(),
        }
    }
}

fn is_absolute_source(source: &str) -> bool {
    source.starts_with('/') || source.contains("://")
}

/// Position in an original source resolved through a map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    /// 1-based
    pub line: u32,
    /// 0-based
    pub column: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct Mapping {
    generated_line: u32,
    generated_column: u32,
    source: usize,
    original_line: u32,
    original_column: u32,
    name: Option<usize>,
}

/// Decoded, queryable view over a `SourceMap`
#[derive(Debug, Clone)]
pub struct SourceMapConsumer {
    sources: Vec<String>,
    names: Vec<String>,
    mappings: Vec<Mapping>,
}

impl SourceMapConsumer {
    pub fn new(map: &SourceMap) -> Result<Self, MinimizeError> {
        if !map.is_valid() {
            return Err(MinimizeError::SourceMap(
                "missing version, sources or mappings".to_string(),
            ));
        }

        let encoded = map.mappings.as_deref().unwrap_or_default();
        let mappings = parse_mappings(encoded, map.sources.len(), map.names.len())?;

        Ok(Self {
            sources: map.sources.iter().map(|s| map.resolve_source(s)).collect(),
            names: map.names.clone(),
            mappings,
        })
    }

    /// Look up the original position for a generated `line` (1-based) and `column` (0-based)
    pub fn original_position_for(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        let index = self
            .mappings
            .partition_point(|m| (m.generated_line, m.generated_column) <= (line, column));
        if index == 0 {
            return None;
        }

        let mapping = &self.mappings[index - 1];
        if mapping.generated_line != line {
            return None;
        }

        Some(OriginalPosition {
            source: self.sources[mapping.source].clone(),
            line: mapping.original_line,
            column: mapping.original_column,
            name: mapping.name.map(|n| self.names[n].clone()),
        })
    }
}

fn parse_mappings(
    encoded: &str,
    sources_len: usize,
    names_len: usize,
) -> Result<Vec<Mapping>, MinimizeError> {
    let mut mappings = Vec::new();
    // Everything except the generated column is relative across lines
    let (mut source, mut original_line, mut original_column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for (line_index, line) in encoded.split(';').enumerate() {
        let mut generated_column = 0i64;

        for segment in line.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_segment(segment)?;
            if !matches!(fields.len(), 1 | 4 | 5) {
                return Err(MinimizeError::SourceMap(format!(
                    "segment '{}' has {} fields",
                    segment,
                    fields.len()
                )));
            }

            generated_column += fields[0];
            if fields.len() == 1 {
                continue;
            }

            source += fields[1];
            original_line += fields[2];
            original_column += fields[3];
            let name_index = if fields.len() == 5 {
                name += fields[4];
                Some(name)
            } else {
                None
            };

            if generated_column < 0 || source < 0 || original_line < 0 || original_column < 0 {
                return Err(MinimizeError::SourceMap(format!(
                    "negative position in segment '{}'",
                    segment
                )));
            }
            if source as usize >= sources_len {
                return Err(MinimizeError::SourceMap(format!(
                    "source index {} out of range",
                    source
                )));
            }

            mappings.push(Mapping {
                generated_line: line_index as u32 + 1,
                generated_column: generated_column as u32,
                source: source as usize,
                original_line: original_line as u32 + 1,
                original_column: original_column as u32,
                name: name_index
                    .filter(|n| *n >= 0 && (*n as usize) < names_len)
                    .map(|n| n as usize),
            });
        }
    }

    mappings.sort_by_key(|m| (m.generated_line, m.generated_column));
    Ok(mappings)
}

fn decode_segment(segment: &str) -> Result<Vec<i64>, MinimizeError> {
    let mut values = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift = 0u32;

    for byte in segment.bytes() {
        let digit = base64_value(byte).ok_or_else(|| {
            MinimizeError::SourceMap(format!("invalid base64 character '{}'", byte as char))
        })?;

        value += i64::from(digit & 0b1_1111) << shift;
        if digit & 0b10_0000 != 0 {
            shift += 5;
            if shift > 60 {
                return Err(MinimizeError::SourceMap("VLQ value overflow".to_string()));
            }
        } else {
            let magnitude = value >> 1;
            values.push(if value & 1 == 1 { -magnitude } else { magnitude });
            value = 0;
            shift = 0;
        }
    }

    if shift != 0 {
        return Err(MinimizeError::SourceMap(format!(
            "unterminated VLQ in segment '{}'",
            segment
        )));
    }
    Ok(values)
}

fn base64_value(byte: u8) -> Option<u8> {
    match byte {
        b'A'..=b'Z' => Some(byte - b'A'),
        b'a'..=b'z' => Some(byte - b'a' + 26),
        b'0'..=b'9' => Some(byte - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_predicate() {
        let map = SourceMap::new(vec!["a.scss".to_string()], "AAAA");
        assert!(map.is_valid());

        let mut missing_mappings = map.clone();
        missing_mappings.mappings = None;
        assert!(!missing_mappings.is_valid());

        let mut no_sources = map.clone();
        no_sources.sources.clear();
        assert!(!no_sources.is_valid());

        let mut no_version = map;
        no_version.version = None;
        assert!(!no_version.is_valid());
    }

    #[test]
    fn test_decode_segment() {
        assert_eq!(decode_segment("AAAA").unwrap(), vec![0, 0, 0, 0]);
        assert_eq!(decode_segment("KASE").unwrap(), vec![5, 0, 9, 2]);
        assert_eq!(decode_segment("D").unwrap(), vec![-1]);
        // 16 needs a continuation digit
        assert_eq!(decode_segment("gB").unwrap(), vec![16]);
        assert!(decode_segment("g").is_err());
        assert!(decode_segment("A*").is_err());
    }

    #[test]
    fn test_original_position_for() {
        // line 3, column 5 -> original.scss 10:2
        let map = SourceMap::new(vec!["original.scss".to_string()], ";;KASE");
        let consumer = SourceMapConsumer::new(&map).unwrap();

        let position = consumer.original_position_for(3, 5).unwrap();
        assert_eq!(position.source, "original.scss");
        assert_eq!(position.line, 10);
        assert_eq!(position.column, 2);

        // Greatest lower bound on the same line
        let position = consumer.original_position_for(3, 40).unwrap();
        assert_eq!(position.line, 10);

        assert!(consumer.original_position_for(3, 4).is_none());
        assert!(consumer.original_position_for(1, 0).is_none());
        assert!(consumer.original_position_for(4, 0).is_none());
    }

    #[test]
    fn test_relative_fields_carry_across_lines() {
        // Line 1: col 0 -> src 0 line 1 col 0
        // Line 2: col 2 -> src 1 line 3 col 4 (deltas against line 1)
        let map = SourceMap::new(
            vec!["a.scss".to_string(), "b.scss".to_string()],
            "AAAA;ECEI",
        );
        let consumer = SourceMapConsumer::new(&map).unwrap();

        let first = consumer.original_position_for(1, 0).unwrap();
        assert_eq!((first.source.as_str(), first.line, first.column), ("a.scss", 1, 0));

        let second = consumer.original_position_for(2, 2).unwrap();
        assert_eq!((second.source.as_str(), second.line, second.column), ("b.scss", 3, 4));
    }

    #[test]
    fn test_source_root_and_names() {
        let mut map = SourceMap::new(vec!["main.scss".to_string()], "AAAAA");
        map.source_root = Some("styles/".to_string());
        map.names = vec!["color".to_string()];

        let consumer = SourceMapConsumer::new(&map).unwrap();
        let position = consumer.original_position_for(1, 0).unwrap();
        assert_eq!(position.source, "styles/main.scss");
        assert_eq!(position.name.as_deref(), Some("color"));
    }

    #[test]
    fn test_rejects_invalid_maps() {
        let mut map = SourceMap::new(vec!["a.scss".to_string()], "AAAA");
        map.mappings = None;
        assert!(SourceMapConsumer::new(&map).is_err());

        // Source index 1 with a single source
        let map = SourceMap::new(vec!["a.scss".to_string()], "ACAA");
        assert!(SourceMapConsumer::new(&map).is_err());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"version":3,"sources":["a.scss"],"names":[],"mappings":"AAAA","sourcesContent":["a{}"]}"#;
        let map = SourceMap::from_json(json).unwrap();
        assert!(map.is_valid());
        assert_eq!(map.sources_content, Some(vec![Some("a{}".to_string())]));

        let back = map.to_json().unwrap();
        assert!(back.contains("\"sourcesContent\""));
        assert!(!back.contains("sourceRoot"));
    }
}
