//! Base payment-card detection primitives.
//!
//! The literal detection routine is deliberately simple: a digit-run scan,
//! a Luhn checksum, and prefix-based network classification. Everything
//! adaptive lives in the skill and engine layers; this module is what the
//! built-in skill executes and what redaction consumes.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 13-19 digits with optional single space/dash separators.
static BASE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\d[ -]?){12,18}\d").expect("base pattern is valid"));

/// A single detected card number span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    /// Byte offset of the span start in the scanned text.
    pub start: usize,
    /// Byte offset one past the span end.
    pub end: usize,
    /// The raw matched text, separators included.
    pub raw: String,
    /// Digits only.
    pub digits: String,
    /// Prefix-classified network.
    pub network: CardNetwork,
    /// Whether the digits pass the Luhn checksum.
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Diners,
    Jcb,
    Unionpay,
    Unknown,
}

impl fmt::Display for CardNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
            Self::Diners => "diners",
            Self::Jcb => "jcb",
            Self::Unionpay => "unionpay",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Luhn checksum over a digits-only string.
///
/// Returns false for anything outside the 13-19 digit card length range.
#[must_use]
pub fn luhn_check(digits: &str) -> bool {
    if !(13..=19).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let mut total = 0u32;
    for (i, b) in digits.bytes().rev().enumerate() {
        let d = u32::from(b - b'0');
        if i % 2 == 1 {
            let doubled = d * 2;
            total += if doubled > 9 { doubled - 9 } else { doubled };
        } else {
            total += d;
        }
    }
    total % 10 == 0
}

/// Classify a digits-only card number by its issuer prefix.
#[must_use]
pub fn card_network(digits: &str) -> CardNetwork {
    let len = digits.len();
    let prefix2: u32 = digits.get(..2).and_then(|p| p.parse().ok()).unwrap_or(0);
    let prefix3: u32 = digits.get(..3).and_then(|p| p.parse().ok()).unwrap_or(0);
    let prefix4: u32 = digits.get(..4).and_then(|p| p.parse().ok()).unwrap_or(0);

    match () {
        () if digits.starts_with('4') && (len == 13 || len == 16) => CardNetwork::Visa,
        () if (51..=55).contains(&prefix2) && len == 16 => CardNetwork::Mastercard,
        () if (prefix2 == 34 || prefix2 == 37) && len == 15 => CardNetwork::Amex,
        () if (prefix4 == 6011 || (650..=659).contains(&prefix3)) && len == 16 => {
            CardNetwork::Discover
        }
        () if ((300..=305).contains(&prefix3) || prefix2 == 36 || prefix2 == 38) && len == 14 => {
            CardNetwork::Diners
        }
        () if prefix2 == 35 && len == 16 => CardNetwork::Jcb,
        () if (620..=625).contains(&prefix3) && (16..=19).contains(&len) => CardNetwork::Unionpay,
        () => CardNetwork::Unknown,
    }
}

/// Scan text with the base pattern, validating each candidate.
#[must_use]
pub fn scan(text: &str) -> Vec<Detection> {
    BASE_PATTERN
        .find_iter(text)
        .filter_map(|m| {
            let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
            if !(13..=19).contains(&digits.len()) {
                return None;
            }
            Some(Detection {
                start: m.start(),
                end: m.end(),
                raw: m.as_str().to_string(),
                valid: luhn_check(&digits),
                network: card_network(&digits),
                digits,
            })
        })
        .collect()
}

/// Drop detections whose (start, end) span duplicates an earlier one.
///
/// Skills routinely re-detect each other's matches; the union is collapsed
/// before redaction and counting.
#[must_use]
pub fn dedup_spans(mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by_key(|d| (d.start, d.end));
    detections.dedup_by_key(|d| (d.start, d.end));
    detections
}

/// Redaction mode for matched spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactMode {
    /// Replace the whole span with `[REDACTED]`.
    #[default]
    Redact,
    /// Keep the last four digits, mask the rest with `*`.
    Mask,
}

/// Replace detected spans in `text` according to `mode`.
///
/// Detections must come from `text`; overlapping spans are collapsed to the
/// first by start offset.
#[must_use]
pub fn redact(text: &str, detections: &[Detection], mode: RedactMode) -> String {
    if detections.is_empty() {
        return text.to_string();
    }

    let mut spans: Vec<&Detection> = detections.iter().collect();
    spans.sort_by_key(|d| d.start);

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for d in spans {
        if d.start < last {
            continue;
        }
        out.push_str(&text[last..d.start]);
        match mode {
            RedactMode::Redact => out.push_str("[REDACTED]"),
            RedactMode::Mask => {
                let num = &d.digits;
                if num.len() > 4 {
                    out.extend(std::iter::repeat_n('*', num.len() - 4));
                    out.push_str(&num[num.len() - 4..]);
                } else {
                    out.extend(std::iter::repeat_n('*', num.len()));
                }
            }
        }
        last = d.end;
    }
    out.push_str(&text[last..]);
    out
}
