//! Default CSS minifier backed by lightningcss.
//!
//! Options (`minimizerOptions` for this stage):
//! - `minify` (default `true`): print compact output
//! - `errorRecovery` (default `false`): skip invalid rules and report them as
//!   warnings instead of failing the asset
//!
//! When the input carries a source map, the output map is composed with it so
//! it points at the original sources.

use super::{Minify, MinifyError, MinifyInput, MinifyOutput};
use crate::sourcemap::SourceMap;
use lightningcss::error::ErrorLocation;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use parcel_sourcemap::SourceMap as GeneratedMap;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Must match the exact version pinned in Cargo.toml
const LIGHTNINGCSS_VERSION: &str = "1.0.0-alpha.70";
const PROJECT_ROOT: &str = "/";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LightningOptions {
    minify: bool,
    error_recovery: bool,
}

impl Default for LightningOptions {
    fn default() -> Self {
        Self {
            minify: true,
            error_recovery: false,
        }
    }
}

/// lightningcss parse + minify + print
#[derive(Debug, Clone, Copy, Default)]
pub struct LightningCss;

impl Minify for LightningCss {
    fn name(&self) -> &str {
        "lightningcss"
    }

    fn version(&self) -> &str {
        LIGHTNINGCSS_VERSION
    }

    fn minify(&self, input: MinifyInput) -> Result<MinifyOutput, MinifyError> {
        let options: LightningOptions = input
            .options
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| MinifyError::new(format!("Invalid lightningcss options: {}", e)))?
            .unwrap_or_default();

        let code = input.code;
        let mut generated_map = input.input_source_map.as_ref().map(|_| {
            let mut map = GeneratedMap::new(PROJECT_ROOT);
            map.add_source(&input.name);
            map
        });
        let recovered = Arc::new(RwLock::new(Vec::new()));

        let parser_options = ParserOptions {
            filename: input.name.clone(),
            error_recovery: options.error_recovery,
            warnings: options.error_recovery.then(|| recovered.clone()),
            ..ParserOptions::default()
        };

        let mut stylesheet = StyleSheet::parse(&code, parser_options)
            .map_err(|e| located_error(e.kind.to_string(), e.loc.as_ref()))?;

        if options.minify {
            stylesheet
                .minify(MinifyOptions::default())
                .map_err(|e| located_error(e.kind.to_string(), e.loc.as_ref()))?;
        }

        let printed = stylesheet
            .to_css(PrinterOptions {
                minify: options.minify,
                source_map: generated_map.as_mut(),
                ..PrinterOptions::default()
            })
            .map_err(|e| located_error(e.kind.to_string(), e.loc.as_ref()))?;

        let warnings: Vec<String> = recovered
            .read()
            .map(|list| {
                list.iter()
                    .map(|w| located_warning(w.kind.to_string(), w.loc.as_ref()))
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            "lightningcss: {} -> {} bytes, {} warnings ({})",
            code.len(),
            printed.code.len(),
            warnings.len(),
            input.name
        );

        let map = match (generated_map, input.input_source_map.as_ref()) {
            (Some(mut generated), Some(previous)) => {
                Some(compose_maps(&mut generated, previous, &input.name)?)
            }
            _ => None,
        };

        Ok(MinifyOutput {
            code: printed.code,
            map,
            warnings,
        })
    }
}

/// Point `generated` at the sources of `previous`. An unreadable previous map
/// leaves `generated` pointing at the asset itself.
fn compose_maps(
    generated: &mut GeneratedMap,
    previous: &SourceMap,
    name: &str,
) -> Result<SourceMap, MinifyError> {
    let previous = previous
        .to_json()
        .map_err(|e| e.to_string())
        .and_then(|json| GeneratedMap::from_json(PROJECT_ROOT, &json).map_err(|e| format!("{:?}", e)));
    match previous {
        Ok(mut previous) => {
            if let Err(e) = generated.extends(&mut previous) {
                debug!("lightningcss: could not compose source maps for {}: {:?}", name, e);
            }
        }
        Err(e) => debug!("lightningcss: input source map of {} not usable: {}", name, e),
    }

    let json = generated
        .to_json(None)
        .map_err(|e| MinifyError::new(format!("Could not serialize source map: {:?}", e)))?;
    SourceMap::from_json(&json).map_err(|e| MinifyError::new(e.to_string()))
}

/// lightningcss lines are 0-based and columns 1-based
fn position(loc: &ErrorLocation) -> (u32, u32) {
    (loc.line + 1, loc.column.saturating_sub(1))
}

fn located_error(message: String, loc: Option<&ErrorLocation>) -> MinifyError {
    match loc {
        Some(loc) => {
            let (line, column) = position(loc);
            MinifyError::new(message).at(line, column)
        }
        None => MinifyError::new(message),
    }
}

fn located_warning(message: String, loc: Option<&ErrorLocation>) -> String {
    match loc {
        Some(loc) => {
            let (line, column) = position(loc);
            format!("{} {}:{}", message, line, column)
        }
        None => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(code: &str, options: Option<serde_json::Value>) -> MinifyInput {
        MinifyInput {
            name: "a.css".to_string(),
            code: code.to_string(),
            input_source_map: None,
            options,
        }
    }

    #[test]
    fn test_minifies_colors_and_whitespace() {
        let output = LightningCss.minify(input(".a{color: #ff0000;}", None)).unwrap();
        assert_eq!(output.code, ".a{color:red}");
        assert!(output.warnings.is_empty());
        assert!(output.map.is_none());
    }

    #[test]
    fn test_parse_error_is_located() {
        let error = LightningCss
            .minify(input(".a{color:red}\n..b{color:red}", None))
            .unwrap_err();
        assert!(!error.message.is_empty());
        assert_eq!(error.line, Some(2));
    }

    #[test]
    fn test_invalid_options_fail_the_stage() {
        let error = LightningCss
            .minify(input(".a{}", Some(json!({ "minify": "yes" }))))
            .unwrap_err();
        assert!(error.message.contains("Invalid lightningcss options"));
    }

    #[test]
    fn test_input_map_is_carried_forward() {
        let mut with_map = input(".a { color: #ff0000; }", None);
        with_map.input_source_map = Some(SourceMap::new(vec!["a.scss".to_string()], "AAAA"));

        let output = LightningCss.minify(with_map).unwrap();

        assert_eq!(output.code, ".a{color:red}");
        let map = output.map.expect("output map");
        assert!(map.is_valid());
        assert!(map.sources.iter().any(|source| source.ends_with("a.scss")));
    }

    #[test]
    fn test_version_matches_pinned_dependency() {
        let manifest = include_str!("../../Cargo.toml");
        let pinned = format!("lightningcss = {{ version = \"={}\"", LIGHTNINGCSS_VERSION);
        assert!(manifest.contains(&pinned), "expected `{}` in Cargo.toml", pinned);
    }

    #[test]
    fn test_unminified_output() {
        let output = LightningCss
            .minify(input(".a{color:red}", Some(json!({ "minify": false }))))
            .unwrap();
        assert!(output.code.contains('\n'));
    }
}
