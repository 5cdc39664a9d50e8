// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config errors rendered as miette diagnostics.
//!
//! An unknown key is reported where it came from: a `[section]` of a TOML
//! file (with a span on the offending line) or a `ROLLCALL_*` variable
//! (under the variable's own name). Either way the closest valid key in the
//! same section is offered when it is close enough by Jaro-Winkler.
//! Validation failures carry a hint for the section they concern.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::ENV_PREFIX;

const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key no section accepts, from a file or the environment.
    #[error("unknown key `{key}` in {location}")]
    #[diagnostic(
        code(rollcall::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// As written: a TOML key, or a full variable name for env input.
        key: String,
        /// `[section]`, `the top level`, or `the environment`.
        location: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a rollcall setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(rollcall::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(rollcall::config::missing_key),
        help("set `{key}` in rollcall.toml or through its ROLLCALL_* variable")
    )]
    MissingKey { key: String },

    /// A value that parsed but makes no sense for rollcall.
    #[error("validation error: {message}")]
    #[diagnostic(code(rollcall::config::validation))]
    Validation {
        message: String,
        #[help]
        hint: Option<String>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(rollcall::config::other))]
    Other(String),
}

impl ConfigError {
    /// Validation error with the hint for the setting named first in `message`.
    pub fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        let hint = validation_hint(&message).map(str::to_string);
        ConfigError::Validation { message, hint }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Accepted here: {valid_keys}"),
        None => format!("accepted here: {valid_keys}"),
    }
}

/// Operator guidance keyed on the section a validation message starts with.
fn validation_hint(message: &str) -> Option<&'static str> {
    let first = message.split_whitespace().next()?;
    let section = first.split('.').next()?;
    let hint = match section {
        "admission" => {
            "CPU thresholds are percentages ordered normal < economy < emergency, \
             with normal < emergency_exit <= emergency"
        }
        "sheets" => {
            "set sheets.spreadsheet_id (or ROLLCALL_SHEETS_SPREADSHEET_ID), \
             or turn the secondary store off with sheets.enabled = false"
        }
        "metrics" => "metrics.listen takes host:port, for example 127.0.0.1:9464",
        "storage" | "buffer" | "durability" | "status" if message.contains("empty") => {
            "every local file needs a path; missing parent directories are created at startup"
        }
        "buffer" | "delivery" | "resolver" | "storage" | "status" => {
            "attempt counts, capacities and intervals must be positive"
        }
        _ => return None,
    };
    Some(hint)
}

/// Where one figment error came from.
enum Origin<'a> {
    Env,
    File(&'a str, &'a str),
    Unknown,
}

/// Merged sections carry the metadata of whichever provider came first, so
/// a set variable with the offending name also counts as environment input.
fn origin<'a>(
    error: &figment::error::Error,
    env_name: &str,
    toml_sources: &'a [(String, String)],
) -> Origin<'a> {
    let metadata = error.metadata.as_ref();
    if metadata.is_some_and(|m| m.name.contains("environment"))
        || std::env::var_os(env_name).is_some()
    {
        return Origin::Env;
    }
    let file = metadata
        .and_then(|m| m.source.as_ref())
        .and_then(|source| match source {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline strings carry no file metadata; use the only source given.
    let only = (toml_sources.len() == 1).then(|| &toml_sources[0]);
    let found = match file {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path).or(only),
        None => only,
    };
    match found {
        Some((path, content)) => Origin::File(path, content),
        None => Origin::Unknown,
    }
}

/// Section names leading up to `field`, without the field itself.
fn section_path(error: &figment::error::Error, field: &str) -> Vec<String> {
    let mut path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
    if path.last().is_some_and(|last| last == field) {
        path.pop();
    }
    path
}

/// `ROLLCALL_BUFFER_CAPACITY` for `["buffer"]` and `capacity`.
fn env_var_name(section: &[String], key: &str) -> String {
    let mut name = ENV_PREFIX.to_string();
    for part in section.iter().map(String::as_str).chain([key]) {
        if !name.ends_with('_') {
            name.push('_');
        }
        name.push_str(&part.to_ascii_uppercase());
    }
    name
}

fn unknown_key(
    error: &figment::error::Error,
    field: &str,
    expected: &[&str],
    toml_sources: &[(String, String)],
) -> ConfigError {
    let section = section_path(error, field);
    let suggestion = suggest_key(field, expected);
    let valid_keys = expected.join(", ");
    let location = match section.first() {
        Some(name) => format!("[{name}]"),
        None => "the top level".to_string(),
    };
    let env_name = env_var_name(&section, field);

    match origin(error, &env_name, toml_sources) {
        Origin::Env => ConfigError::UnknownKey {
            key: env_name,
            location: "the environment".to_string(),
            suggestion: suggestion.map(|s| env_var_name(&section, &s)),
            valid_keys,
            span: None,
            src: None,
        },
        Origin::File(path, content) => {
            let offset = find_key_offset(content, &section, field);
            ConfigError::UnknownKey {
                key: field.to_string(),
                location,
                suggestion,
                valid_keys,
                span: offset.map(|o| SourceSpan::new(o.into(), field.len())),
                src: offset.map(|_| NamedSource::new(path, content.to_string())),
            }
        }
        Origin::Unknown => ConfigError::UnknownKey {
            key: field.to_string(),
            location,
            suggestion,
            valid_keys,
            span: None,
            src: None,
        },
    }
}

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
///
/// `toml_sources` pairs a file path with its contents and is used to attach
/// source spans to unknown-key errors.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                unknown_key(&error, field, expected, toml_sources)
            }
            Kind::MissingField(field) => ConfigError::MissingKey {
                key: field.clone().into_owned(),
            },
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Byte offset of `field` inside the `[section]` named by `path[0]`.
///
/// Top-level fields are searched from the start of the document.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let search_start = match path.first() {
        None => 0,
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header).map(|pos| pos + header.len())?
        }
    };

    let mut line_start = search_start;
    for line in content[search_start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            // Next section; the key is not in this one.
            break;
        }
        if let Some(after) = trimmed.strip_prefix(field) {
            if after.starts_with([' ', '\t', '=']) {
                return Some(line_start + (line.len() - trimmed.len()));
            }
        }
        line_start += line.len();
    }
    None
}

/// Closest accepted key, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics with miette's graphical handler into a string.
pub fn render_errors_to_string(errors: &[ConfigError]) -> String {
    let handler = miette::GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error as &dyn Diagnostic).is_err() {
            out.push_str(&format!("error: {error}\n"));
        }
    }
    out
}

/// Render diagnostics to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", render_errors_to_string(errors));
}
