//! Output helpers shared by the command handlers.

use colored::Colorize;
use serde::Serialize;

use crate::error::Result;

/// Serialize a payload as one JSON document on stdout.
pub fn emit_json<T: Serialize>(payload: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(payload)?);
    Ok(())
}

/// Section heading for human output.
pub fn heading(text: &str) {
    println!("{}", text.bold().cyan());
}

/// Aligned key/value row for human output.
pub fn kv(key: &str, value: impl std::fmt::Display) {
    println!("  {:<22} {value}", format!("{key}:").dimmed());
}

/// Format an optional score to two decimals, or a dash.
#[must_use]
pub fn score(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}
