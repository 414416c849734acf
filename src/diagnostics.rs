//! # Diagnostics Module
//!
//! Traduce errori e warning grezzi dei minifier in `Diagnostic` finali,
//! risolvendo la posizione originale tramite la source map dell'asset.
//!
//! ## Responsabilità:
//! - `build_error`: messaggio con posizione originale + posizione generata,
//!   oppure solo generata, oppure stack, oppure messaggio nudo
//! - `build_warning`: estrae `<line>:<column>` dal testo, risolve la posizione,
//!   applica il filtro utente una sola volta, poi formatta
//! - `RequestShortener`: accorcia i path assoluti delle sorgenti originali
//!
//! ## Formato dei messaggi:
//! ```text
//! a.css from Css Minimizer
//! Unexpected token [./src/original.scss:10,2][a.css:3,5]
//!
//! Css Minimizer: Unknown property ./src/original.scss:4:0
//! ```

use crate::minify::MinifyError;
use crate::sourcemap::SourceMapConsumer;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

const PLUGIN_NAME: &str = "Css Minimizer";

/// `(raw warning, asset name, resolved original source) -> keep`
pub type WarningsFilter = Arc<dyn Fn(&str, &str, Option<&str>) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginalLocation {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

/// A finalized error or warning attributed to one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_location: Option<OriginalLocation>,
}

impl Diagnostic {
    pub fn error(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            file: file.into(),
            original_location: None,
        }
    }

    pub fn warning(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            file: file.into(),
            original_location: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Turns source paths into compact identifiers for messages
pub trait RequestShortener: Send + Sync {
    fn shorten(&self, request: &str) -> String;
}

/// Rewrites paths under a context directory as `./relative`
#[derive(Debug, Clone, Default)]
pub struct ContextShortener {
    context: Option<String>,
}

impl ContextShortener {
    pub fn new(context: impl AsRef<Path>) -> Self {
        let context = context
            .as_ref()
            .to_string_lossy()
            .replace('\\', "/")
            .trim_end_matches('/')
            .to_string();
        Self {
            context: (!context.is_empty()).then_some(context),
        }
    }

    /// Shortener that only normalizes separators and schemes
    pub fn identity() -> Self {
        Self::default()
    }
}

impl RequestShortener for ContextShortener {
    fn shorten(&self, request: &str) -> String {
        let request = request.replace('\\', "/");
        let request = match request.strip_prefix("webpack://") {
            Some(rest) if rest.starts_with("/.") => rest[1..].to_string(),
            Some(rest) => rest.to_string(),
            None => request,
        };

        match self.context.as_deref() {
            Some(context) if request == context => ".".to_string(),
            Some(context) => match request.strip_prefix(context) {
                Some(rest) if rest.starts_with('/') => format!(".{}", rest),
                _ => request,
            },
            None => request,
        }
    }
}

/// Result of looking for a trailing `<line>:<column>` in warning text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningLocation<'a> {
    Found { line: u32, column: u32, rest: &'a str },
    NotFound,
}

/// Parse `<message> <line>:<column>`. The last whitespace-separated token must
/// end in two numeric `:`-separated fields (`3:5`, `a.css:3:5`).
pub fn parse_location(text: &str) -> WarningLocation<'_> {
    let trimmed = text.trim_end();
    let Some((rest, token)) = trimmed.rsplit_once(char::is_whitespace) else {
        return WarningLocation::NotFound;
    };

    let mut fields = token.rsplit(':');
    let column = fields.next().and_then(parse_number);
    let line = fields.next().and_then(parse_number);

    match (line, column) {
        (Some(line), Some(column)) => WarningLocation::Found {
            line,
            column,
            rest: rest.trim_end(),
        },
        _ => WarningLocation::NotFound,
    }
}

fn parse_number(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Builds final diagnostics for one build
#[derive(Clone, Default)]
pub struct DiagnosticMapper {
    shortener: Option<Arc<dyn RequestShortener>>,
    warnings_filter: Option<WarningsFilter>,
}

impl DiagnosticMapper {
    pub fn new(
        shortener: Option<Arc<dyn RequestShortener>>,
        warnings_filter: Option<WarningsFilter>,
    ) -> Self {
        Self {
            shortener,
            warnings_filter,
        }
    }

    /// Convert a stage failure into an error diagnostic for `file`
    pub fn build_error(
        &self,
        error: &MinifyError,
        file: &str,
        source_map: Option<&SourceMapConsumer>,
    ) -> Diagnostic {
        let header = format!("{} from {}", file, PLUGIN_NAME);

        // Line 0 carries no usable position
        let Some(line) = error.line.filter(|line| *line > 0) else {
            let body = error.stack.as_deref().unwrap_or(&error.message);
            return Diagnostic::error(file, format!("{}\n{}", header, body));
        };
        let column = error.column.unwrap_or(0);
        let stack = stack_tail(error.stack.as_deref());

        let original = source_map.and_then(|map| map.original_position_for(line, column));
        if let (Some(original), Some(shortener)) = (original, self.shortener.as_ref()) {
            let message = format!(
                "{}\n{} [{}:{},{}][{}:{},{}]{}",
                header,
                error.message,
                shortener.shorten(&original.source),
                original.line,
                original.column,
                file,
                line,
                column,
                stack
            );
            return Diagnostic {
                original_location: Some(OriginalLocation {
                    source: original.source,
                    line: original.line,
                    column: original.column,
                }),
                ..Diagnostic::error(file, message)
            };
        }

        Diagnostic::error(
            file,
            format!(
                "{}\n{} [{}:{},{}]{}",
                header, error.message, file, line, column, stack
            ),
        )
    }

    /// Convert raw warning text into a warning diagnostic, or `None` if filtered out
    pub fn build_warning(
        &self,
        warning: &str,
        file: &str,
        source_map: Option<&SourceMapConsumer>,
    ) -> Option<Diagnostic> {
        let mut message = warning.trim_end();
        let mut location = None;

        if let (Some(map), WarningLocation::Found { line, column, rest }) =
            (source_map, parse_location(warning))
        {
            if let (Some(original), Some(shortener)) =
                (map.original_position_for(line, column), self.shortener.as_ref())
            {
                if original.source != file {
                    message = rest;
                    location = Some((
                        shortener.shorten(&original.source),
                        OriginalLocation {
                            source: original.source,
                            line: original.line,
                            column: original.column,
                        },
                    ));
                }
            }
        }

        if let Some(filter) = &self.warnings_filter {
            let resolved = location.as_ref().map(|(_, loc)| loc.source.as_str());
            if !filter(warning, file, resolved) {
                return None;
            }
        }

        Some(match location {
            Some((shortened, original)) => {
                let message = format!(
                    "{}: {} {}:{}:{}",
                    PLUGIN_NAME, message, shortened, original.line, original.column
                );
                Diagnostic {
                    original_location: Some(original),
                    ..Diagnostic::warning(file, message)
                }
            }
            None => Diagnostic::warning(file, format!("{}: {}", PLUGIN_NAME, message)),
        })
    }
}

/// Stack trace without its first line (which repeats the message)
fn stack_tail(stack: Option<&str>) -> String {
    match stack {
        Some(stack) => {
            let rest: Vec<&str> = stack.lines().skip(1).collect();
            if rest.is_empty() {
                String::new()
            } else {
                format!("\n{}", rest.join("\n"))
            }
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::SourceMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn consumer() -> SourceMapConsumer {
        // 3:5 -> original.scss 10:2
        SourceMapConsumer::new(&SourceMap::new(vec!["original.scss".to_string()], ";;KASE"))
            .unwrap()
    }

    fn mapper() -> DiagnosticMapper {
        DiagnosticMapper::new(Some(Arc::new(ContextShortener::identity())), None)
    }

    #[test]
    fn test_parse_location() {
        assert_eq!(
            parse_location("Unknown word 3:5"),
            WarningLocation::Found {
                line: 3,
                column: 5,
                rest: "Unknown word"
            }
        );
        assert_eq!(
            parse_location("Unknown word a.css:12:0  "),
            WarningLocation::Found {
                line: 12,
                column: 0,
                rest: "Unknown word"
            }
        );
        assert_eq!(parse_location("no location here"), WarningLocation::NotFound);
        assert_eq!(parse_location("at 12:30pm"), WarningLocation::NotFound);
        assert_eq!(parse_location("3:5"), WarningLocation::NotFound);
        assert_eq!(parse_location("ratio :5"), WarningLocation::NotFound);
    }

    #[test]
    fn test_error_with_resolved_location() {
        let error = MinifyError::new("Unexpected token").at(3, 5);
        let diagnostic = mapper().build_error(&error, "a.css", Some(&consumer()));

        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.file, "a.css");
        assert!(diagnostic.message.starts_with("a.css from Css Minimizer\n"));
        assert!(diagnostic.message.contains("original.scss:10,2"));
        assert!(diagnostic.message.contains("a.css:3,5"));
        assert_eq!(
            diagnostic.original_location,
            Some(OriginalLocation {
                source: "original.scss".to_string(),
                line: 10,
                column: 2
            })
        );
    }

    #[test]
    fn test_error_stack_first_line_replaced() {
        let error = MinifyError::new("Unexpected token")
            .at(3, 5)
            .with_stack("Error: Unexpected token\n    at parse\n    at minify");
        let diagnostic = mapper().build_error(&error, "a.css", Some(&consumer()));

        assert!(diagnostic
            .message
            .ends_with("[original.scss:10,2][a.css:3,5]\n    at parse\n    at minify"));
        assert!(!diagnostic.message.contains("Error: Unexpected token"));
    }

    #[test]
    fn test_error_falls_back_to_generated_location() {
        let error = MinifyError::new("Unexpected token").at(7, 1);
        let diagnostic = mapper().build_error(&error, "a.css", Some(&consumer()));
        assert_eq!(
            diagnostic.message,
            "a.css from Css Minimizer\nUnexpected token [a.css:7,1]"
        );
        assert!(diagnostic.original_location.is_none());

        // Resolvable, but nobody to shorten the path
        let bare = DiagnosticMapper::default();
        let error = MinifyError::new("Unexpected token").at(3, 5);
        let diagnostic = bare.build_error(&error, "a.css", Some(&consumer()));
        assert_eq!(
            diagnostic.message,
            "a.css from Css Minimizer\nUnexpected token [a.css:3,5]"
        );
    }

    #[test]
    fn test_error_without_line() {
        let with_stack = MinifyError::new("boom").with_stack("Error: boom\n    at x");
        assert_eq!(
            mapper().build_error(&with_stack, "a.css", None).message,
            "a.css from Css Minimizer\nError: boom\n    at x"
        );

        let bare = MinifyError::new("boom");
        assert_eq!(
            mapper().build_error(&bare, "a.css", None).message,
            "a.css from Css Minimizer\nboom"
        );
    }

    #[test]
    fn test_error_on_line_zero_is_unlocated() {
        let zero = MinifyError::new("boom").at(0, 4);
        assert_eq!(
            mapper().build_error(&zero, "a.css", None).message,
            "a.css from Css Minimizer\nboom"
        );

        let with_stack = zero.with_stack("Error: boom\n    at x");
        assert_eq!(
            mapper().build_error(&with_stack, "a.css", None).message,
            "a.css from Css Minimizer\nError: boom\n    at x"
        );
    }

    #[test]
    fn test_warning_resolved_through_map() {
        let diagnostic = mapper()
            .build_warning("Unknown property 3:5", "a.css", Some(&consumer()))
            .unwrap();
        assert_eq!(diagnostic.severity, Severity::Warning);
        assert_eq!(
            diagnostic.message,
            "Css Minimizer: Unknown property original.scss:10:2"
        );
    }

    #[test]
    fn test_warning_kept_verbatim_without_map_or_match() {
        let mapper = mapper();
        assert_eq!(
            mapper
                .build_warning("Unknown property 3:5", "a.css", None)
                .unwrap()
                .message,
            "Css Minimizer: Unknown property 3:5"
        );
        assert_eq!(
            mapper
                .build_warning("Unknown property 9:9", "a.css", Some(&consumer()))
                .unwrap()
                .message,
            "Css Minimizer: Unknown property 9:9"
        );
    }

    #[test]
    fn test_warning_mapped_to_same_file_is_not_rewritten() {
        let self_map =
            SourceMapConsumer::new(&SourceMap::new(vec!["a.css".to_string()], ";;KASE")).unwrap();
        let diagnostic = mapper()
            .build_warning("Unknown property 3:5", "a.css", Some(&self_map))
            .unwrap();
        assert_eq!(diagnostic.message, "Css Minimizer: Unknown property 3:5");
        assert!(diagnostic.original_location.is_none());
    }

    #[test]
    fn test_warnings_filter_runs_once_with_resolved_source() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let filter: WarningsFilter = Arc::new(move |warning, file, source| {
            seen.fetch_add(1, Ordering::SeqCst);
            assert_eq!(file, "a.css");
            if warning.starts_with("Drop") {
                assert_eq!(source, Some("original.scss"));
                false
            } else {
                true
            }
        });
        let mapper = DiagnosticMapper::new(Some(Arc::new(ContextShortener::identity())), Some(filter));

        assert!(mapper
            .build_warning("Drop me 3:5", "a.css", Some(&consumer()))
            .is_none());
        assert!(mapper
            .build_warning("Keep me", "a.css", Some(&consumer()))
            .is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_context_shortener() {
        let shortener = ContextShortener::new("/home/dev/project/");
        assert_eq!(
            shortener.shorten("/home/dev/project/src/a.scss"),
            "./src/a.scss"
        );
        assert_eq!(shortener.shorten("/home/dev/project"), ".");
        assert_eq!(shortener.shorten("/home/dev/projectx/a.scss"), "/home/dev/projectx/a.scss");
        assert_eq!(
            shortener.shorten("webpack:///home/dev/project/src/a.scss"),
            "./src/a.scss"
        );
        assert_eq!(shortener.shorten("webpack:///./src/b.scss"), "./src/b.scss");
        assert_eq!(ContextShortener::identity().shorten("src\\a.scss"), "src/a.scss");
    }
}
