//! Field extraction and classification for the app specification document.
//!
//! Specs are free text with optional tag-delimited fields
//! (`<app_type>dashboard</app_type>`). Template placeholders (`{{...}}`)
//! read as absent.

use std::fmt;
use std::str::FromStr;

use regex::RegexBuilder;

/// Application classifier accepted by the scaffolding generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppType {
    Landing,
    #[default]
    Crud,
    Dashboard,
    Ai,
    Game,
    Saas,
    Social,
    Collaboration,
    Ecommerce,
    Directory,
}

impl AppType {
    pub fn as_str(self) -> &'static str {
        match self {
            AppType::Landing => "landing",
            AppType::Crud => "crud",
            AppType::Dashboard => "dashboard",
            AppType::Ai => "ai",
            AppType::Game => "game",
            AppType::Saas => "saas",
            AppType::Social => "social",
            AppType::Collaboration => "collaboration",
            AppType::Ecommerce => "ecommerce",
            AppType::Directory => "directory",
        }
    }
}

impl FromStr for AppType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "landing" => Ok(AppType::Landing),
            "crud" => Ok(AppType::Crud),
            "dashboard" => Ok(AppType::Dashboard),
            "ai" => Ok(AppType::Ai),
            "game" => Ok(AppType::Game),
            "saas" => Ok(AppType::Saas),
            "social" => Ok(AppType::Social),
            "collaboration" => Ok(AppType::Collaboration),
            "ecommerce" => Ok(AppType::Ecommerce),
            "directory" => Ok(AppType::Directory),
            _ => Err(()),
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract a `<field>value</field>` pair from spec content (case-insensitive).
///
/// Returns `None` when the field is missing or holds an unfilled template
/// placeholder.
pub fn parse_spec_field(content: &str, field: &str) -> Option<String> {
    let pattern = format!(r"<{0}>\s*([^<]+?)\s*</{0}>", regex::escape(field));
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()?;
    let value = re.captures(content)?.get(1)?.as_str().trim().to_string();
    if value.starts_with("{{") && value.ends_with("}}") {
        return None;
    }
    Some(value)
}

/// App type declared in the spec, falling back to the default classifier when
/// the field is absent, unset, or not one of the known types.
pub fn app_type_from_spec(content: &str) -> AppType {
    parse_spec_field(content, "app_type")
        .and_then(|value| value.parse().ok())
        .unwrap_or_default()
}

const BACKEND_INDICATORS: [&str; 4] = [
    "convex",
    "real-time database",
    "realtime database",
    "serverless backend",
];

/// Whether the spec text indicates a dependency on a provisioned Convex
/// backend.
///
/// Free-text matching is inherently fuzzy and can false-negative on creatively
/// worded specs; the provisioning gate also checks on-disk evidence.
pub fn spec_mentions_backend(content: &str) -> bool {
    let lower = content.to_lowercase();
    BACKEND_INDICATORS
        .iter()
        .any(|indicator| lower.contains(indicator))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_extracts_and_trims() {
        let spec = "intro\n<app_type>  dashboard \n</app_type>\nrest";
        assert_eq!(
            parse_spec_field(spec, "app_type"),
            Some("dashboard".to_string())
        );
    }

    #[test]
    fn parse_field_is_case_insensitive() {
        let spec = "<APP_TYPE>Game</APP_TYPE>";
        assert_eq!(parse_spec_field(spec, "app_type"), Some("Game".to_string()));
    }

    #[test]
    fn parse_field_treats_placeholder_as_absent() {
        let spec = "<app_type>{{APP_TYPE}}</app_type>";
        assert_eq!(parse_spec_field(spec, "app_type"), None);
    }

    #[test]
    fn parse_field_missing_returns_none() {
        assert_eq!(parse_spec_field("no tags here", "app_type"), None);
    }

    #[test]
    fn app_type_defaults_to_crud() {
        assert_eq!(app_type_from_spec("plain spec"), AppType::Crud);
        assert_eq!(
            app_type_from_spec("<app_type>spaceship</app_type>"),
            AppType::Crud
        );
        assert_eq!(
            app_type_from_spec("<app_type>{{APP_TYPE}}</app_type>"),
            AppType::Crud
        );
    }

    #[test]
    fn app_type_parses_known_values() {
        assert_eq!(
            app_type_from_spec("<app_type>Dashboard</app_type>"),
            AppType::Dashboard
        );
        assert_eq!("ecommerce".parse(), Ok(AppType::Ecommerce));
    }

    #[test]
    fn backend_indicators_are_case_insensitive() {
        assert!(spec_mentions_backend("Uses Convex for storage"));
        assert!(spec_mentions_backend("needs a Real-Time Database"));
        assert!(spec_mentions_backend("a serverless backend"));
        assert!(!spec_mentions_backend("a static landing page"));
    }
}
