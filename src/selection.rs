//! Asset selection by name: `test`, then `include`, then `exclude`.

use crate::config::Config;
use crate::error::MinimizeError;
use regex::Regex;

/// Compiled selection rules
#[derive(Debug, Clone)]
pub struct Selection {
    test: Vec<Regex>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl Selection {
    pub fn from_config(config: &Config) -> Result<Self, MinimizeError> {
        Ok(Self {
            test: compile(config.test.as_slice())?,
            include: compile(config.include.as_slice())?,
            exclude: compile(config.exclude.as_slice())?,
        })
    }

    /// Whether an asset with this name is a minification candidate
    pub fn matches(&self, name: &str) -> bool {
        if !self.test.iter().any(|re| re.is_match(name)) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(name)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(name))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, MinimizeError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(MinimizeError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OneOrMany;

    #[test]
    fn test_default_matches_css_with_query() {
        let selection = Selection::from_config(&Config::default()).unwrap();

        assert!(selection.matches("main.css"));
        assert!(selection.matches("dist/Main.CSS"));
        assert!(selection.matches("main.css?v=3"));
        assert!(!selection.matches("main.js"));
        assert!(!selection.matches("main.css.map"));
        assert!(!selection.matches("main.scss"));
    }

    #[test]
    fn test_include_and_exclude() {
        let config = Config {
            include: OneOrMany::Many(vec!["^pages/".to_string(), "^app".to_string()]),
            exclude: OneOrMany::One(r"\.min\.css$".to_string()),
            ..Default::default()
        };
        let selection = Selection::from_config(&config).unwrap();

        assert!(selection.matches("pages/home.css"));
        assert!(selection.matches("app.css"));
        assert!(!selection.matches("vendor/lib.css"));
        assert!(!selection.matches("pages/lib.min.css"));
    }

    #[test]
    fn test_invalid_pattern() {
        let config = Config {
            include: OneOrMany::One("[".to_string()),
            ..Default::default()
        };
        assert!(Selection::from_config(&config).is_err());
    }
}
