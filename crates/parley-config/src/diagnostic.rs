// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment reports deserialization failures as a chain of errors. Each one is
//! mapped to a [`ConfigError`] that miette can render with the offending line
//! of `parley.toml` and, for misspelled keys or enum values, the closest valid
//! spelling.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::{Error as FigmentError, Kind};
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler similarity above which a spelling is suggested.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(parley::config::unknown_key),
        help("{}", choices_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: Vec<String>,
        #[label("not a recognized key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(parley::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
    },

    /// An enumerated value such as a service type or access level.
    #[error("unknown value `{value}` for `{key}`")]
    #[diagnostic(
        code(parley::config::unknown_variant),
        help("{}", choices_help(suggestion.as_deref(), valid_values))
    )]
    UnknownVariant {
        key: String,
        value: String,
        suggestion: Option<String>,
        valid_values: Vec<String>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(parley::config::missing_key),
        help("set `{key}` in parley.toml")
    )]
    MissingKey { key: String },

    #[error("validation error: {message}")]
    #[diagnostic(code(parley::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(parley::config::other))]
    Other(String),
}

fn choices_help(suggestion: Option<&str>, choices: &[String]) -> String {
    let choices = choices.join(", ");
    match suggestion {
        Some(s) => format!("did you mean `{s}`? expected one of: {choices}"),
        None => format!("expected one of: {choices}"),
    }
}

/// Maps every error in a figment failure to a [`ConfigError`].
///
/// `sources` pairs each TOML file path with its content; unknown keys found
/// in one of them get a labelled span.
pub fn figment_to_config_errors(err: FigmentError, sources: &[(String, String)]) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = locate(&error, field, sources).unzip();
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.iter().map(|k| k.to_string()).collect(),
                    span,
                    src,
                }
            }
            Kind::UnknownVariant(value, expected) => ConfigError::UnknownVariant {
                key: key_path(&error),
                value: value.clone(),
                suggestion: suggest_key(value, expected),
                valid_values: expected.iter().map(|v| v.to_string()).collect(),
            },
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.to_string(),
            },
            Kind::InvalidType(found, expected) => ConfigError::InvalidType {
                key: key_path(&error),
                found: found.to_string(),
                expected: expected.clone(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

fn key_path(error: &FigmentError) -> String {
    error.path.join(".")
}

/// Span of `field` in whichever source file the error came from.
fn locate(
    error: &FigmentError,
    field: &str,
    sources: &[(String, String)],
) -> Option<(SourceSpan, NamedSource<String>)> {
    let origin = match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => path.display().to_string(),
        _ => return None,
    };
    let (path, content) = sources.iter().find(|(p, _)| *p == origin)?;
    let offset = find_key_offset(content, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(path, content.clone()),
    ))
}

/// Byte offset of `field` as a key line inside the table named by the first
/// element of `path`, or at top level when `path` is empty.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        Some(table) => {
            let header = format!("[{table}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let rest = &line[indent..];
        if rest
            .strip_prefix(field)
            .is_some_and(|after| after.starts_with([' ', '\t', '=']))
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// The valid key closest to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Writes each error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_the_closest_key() {
        let valid = &["name", "display_name", "custom_instructions"];
        assert_eq!(suggest_key("naem", valid), Some("name".to_string()));
        let types = &["openai", "openaicompatible", "azure", "anthropic"];
        assert_eq!(suggest_key("antropic", types), Some("anthropic".to_string()));
    }

    #[test]
    fn distant_typos_get_no_suggestion() {
        assert_eq!(suggest_key("zzzzzz", &["enabled", "provider", "dimensions"]), None);
    }

    #[test]
    fn key_offset_is_found_inside_its_table() {
        let content = "wal_mode = false\n[storage]\n  wal_mod = true\n";
        let offset = find_key_offset(content, &["storage".to_string()], "wal_mod").unwrap();
        assert_eq!(&content[offset..offset + 7], "wal_mod");
        assert_eq!(find_key_offset(content, &[], "wal_mode"), Some(0));
        assert_eq!(find_key_offset(content, &["mcp".to_string()], "wal_mod"), None);
    }

    #[test]
    fn help_lists_choices() {
        let help = choices_help(Some("all"), &["all".into(), "none".into()]);
        assert_eq!(help, "did you mean `all`? expected one of: all, none");
    }
}
