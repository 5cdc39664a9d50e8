// SPDX-FileCopyrightText: 2026 Rollcall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./rollcall.toml` > `~/.config/rollcall/rollcall.toml` >
//! `/etc/rollcall/rollcall.toml` with environment variable overrides via `ROLLCALL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RollcallConfig;

/// Prefix of environment variables that override config values.
pub const ENV_PREFIX: &str = "ROLLCALL_";

/// Top-level sections, used to map `ROLLCALL_<SECTION>_<KEY>` onto `section.key`.
pub const SECTIONS: &[&str] = &[
    "bot",
    "storage",
    "sheets",
    "buffer",
    "dedup",
    "durability",
    "admission",
    "delivery",
    "resolver",
    "bridge",
    "metrics",
    "status",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/rollcall/rollcall.toml` (system-wide)
/// 3. `~/.config/rollcall/rollcall.toml` (user XDG config)
/// 4. `./rollcall.toml` (local directory)
/// 5. `ROLLCALL_*` environment variables
pub fn load_config() -> Result<RollcallConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<RollcallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RollcallConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RollcallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RollcallConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(RollcallConfig::default()))
        .merge(Toml::file("/etc/rollcall/rollcall.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("rollcall/rollcall.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("rollcall.toml"))
        .merge(env_provider())
}

/// Map a prefix-stripped env key onto a dotted config path.
///
/// Figment hands over the key as written (`SHEETS_ACCESS_TOKEN`), so it is
/// lowercased first. Only the first underscore after a known section name
/// becomes a dot, so `sheets_access_token` maps to `sheets.access_token`,
/// not `sheets.access.token`.
pub fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_first_section_only() {
        assert_eq!(map_env_key("sheets_access_token"), "sheets.access_token");
        assert_eq!(map_env_key("buffer_journal_path"), "buffer.journal_path");
        assert_eq!(
            map_env_key("admission_economy_max_in_flight"),
            "admission.economy_max_in_flight"
        );
        assert_eq!(map_env_key("bot_log_level"), "bot.log_level");
    }

    #[test]
    fn env_keys_are_matched_case_insensitively() {
        assert_eq!(map_env_key("SHEETS_ACCESS_TOKEN"), "sheets.access_token");
        assert_eq!(map_env_key("Buffer_Capacity"), "buffer.capacity");
    }

    #[test]
    fn unknown_section_is_left_alone() {
        assert_eq!(map_env_key("nonsense_key"), "nonsense_key");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("rollcall.toml", "[buffer]\ncapacity = 10\n")?;
            jail.set_env("ROLLCALL_BUFFER_CAPACITY", "25");
            jail.set_env("ROLLCALL_SHEETS_ACCESS_TOKEN", "ya29.token");

            let config = load_config_from_path(Path::new("rollcall.toml"))?;
            assert_eq!(config.buffer.capacity, 25);
            assert_eq!(config.sheets.access_token.as_deref(), Some("ya29.token"));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_apply_without_a_file() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("ROLLCALL_RESOLVER_MAX_ATTEMPTS", "5");
            jail.set_env("ROLLCALL_BOT_LOG_LEVEL", "debug");

            let config: RollcallConfig = build_figment().extract()?;
            assert_eq!(config.resolver.max_attempts, 5);
            assert_eq!(config.bot.log_level, "debug");
            Ok(())
        });
    }
}
