//! # Minify Module
//!
//! Interfaccia polimorfica per i minifier: ogni backend implementa `Minify`
//! e viene registrato per nome in un `MinifierRegistry`.
//!
//! ## Responsabilità:
//! - `Minify`: capability opaca `minify(input, options) -> {code, map, warnings}`
//! - `MinifyError`: fallimento di uno stage, con posizione e stack opzionali
//! - `MinifierRegistry`: risoluzione nome → implementazione, usata sia dal
//!   flusso inline sia dai worker (che ricevono solo nomi, mai oggetti)
//!
//! ## Backend disponibili:
//! - `lightningcss`: minifier CSS di default

pub mod lightning;

use crate::error::MinimizeError;
use crate::sourcemap::SourceMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use lightning::LightningCss;

/// Input handed to one minify stage
#[derive(Debug, Clone, PartialEq)]
pub struct MinifyInput {
    /// Asset name, used by minifiers for their own messages
    pub name: String,
    pub code: String,
    pub input_source_map: Option<SourceMap>,
    /// Stage options; `None` means the minifier applies its defaults
    pub options: Option<Value>,
}

/// Result of one minify stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinifyOutput {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<SourceMap>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Failure raised by a minify stage
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct MinifyError {
    pub message: String,
    /// 1-based line in the stage input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 0-based column in the stage input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl MinifyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            stack: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// A minification backend
pub trait Minify: Send + Sync {
    /// Registry key, also part of the cache fingerprint
    fn name(&self) -> &str;

    /// Bumping the version invalidates cached output
    fn version(&self) -> &str {
        "0"
    }

    fn minify(&self, input: MinifyInput) -> Result<MinifyOutput, MinifyError>;
}

/// Minifiers addressable by name
#[derive(Clone, Default)]
pub struct MinifierRegistry {
    minifiers: BTreeMap<String, Arc<dyn Minify>>,
}

impl MinifierRegistry {
    /// Registry without any backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in backends
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LightningCss));
        registry
    }

    /// Add or replace a backend under its own name
    pub fn register(&mut self, minifier: Arc<dyn Minify>) {
        self.minifiers.insert(minifier.name().to_string(), minifier);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Minify>> {
        self.minifiers.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Minify>, MinimizeError> {
        self.get(name)
            .ok_or_else(|| MinimizeError::UnknownMinifier(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.minifiers.keys().map(String::as_str)
    }
}

impl fmt::Debug for MinifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Minify for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn minify(&self, input: MinifyInput) -> Result<MinifyOutput, MinifyError> {
            Ok(MinifyOutput {
                code: input.code.to_uppercase(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_registry_resolution() {
        let mut registry = MinifierRegistry::with_builtins();
        assert!(registry.get("lightningcss").is_some());
        assert!(matches!(
            registry.resolve("upper"),
            Err(MinimizeError::UnknownMinifier(_))
        ));

        registry.register(Arc::new(Upper));
        let upper = registry.resolve("upper").unwrap();
        assert_eq!(upper.version(), "0");
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["lightningcss", "upper"]);
    }

    #[test]
    fn test_minify_error_wire_shape() {
        let error = MinifyError::new("Unexpected token").at(3, 5);
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Unexpected token","line":3,"column":5}"#);
        assert_eq!(error.to_string(), "Unexpected token");
    }
}
