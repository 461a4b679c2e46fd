//! SQL identifier quoting and validation.

use crate::Result;
use crate::error::{ConfigurationErrorKind, Error};
use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern compiles")
    })
}

fn qualified_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(foreign|self)\.([A-Za-z_][A-Za-z0-9_]*)$").expect("static pattern compiles")
    })
}

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use chainorm_core::quote_ident;
///
/// assert_eq!(quote_ident("users"), "\"users\"");
/// assert_eq!(quote_ident("user\"name"), "\"user\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL identifier using MySQL backtick quoting.
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Whether `name` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Reject names that cannot serve as monikers, columns or relationship names.
#[allow(clippy::result_large_err)]
pub fn validate_identifier(what: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::config(
            ConfigurationErrorKind::InvalidIdentifier,
            format!("invalid {what} name '{name}'"),
        ))
    }
}

/// Split a `foreign.<col>` / `self.<col>` key into its side and column.
pub fn split_condition_key(key: &str) -> Option<(&str, &str)> {
    let caps = qualified_pattern().captures(key)?;
    let side = caps.get(1)?.as_str();
    let col = caps.get(2)?.as_str();
    Some((side, col))
}
