//! Normalization of loosely formatted spreadsheet values
//!
//! Every function here is total: malformed input maps to a sentinel or to
//! zero, never to an error. Range checks belong to the validator.

use crate::record::RawValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel branch code for rows whose branch cell is blank
pub const UNKNOWN_BRANCH: &str = "UNKNOWN";

/// Known branch spellings (explicit, not inferred).
/// Codes missing from this table pass through uppercased.
const BRANCH_SYNONYMS: &[(&str, &str)] = &[
    ("ME", "MECH"),
    ("MECHANICAL", "MECH"),
    ("EEE", "EEE"),
    ("ECE", "ECE"),
    ("CSE", "CSE"),
    ("CSM", "CSM"),
    ("CSD", "CSD"),
    ("CIVIL", "CIVIL"),
    ("CE", "CIVIL"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Healthy,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Healthy => "Healthy",
            RiskLevel::NeedsAttention => "Needs Attention",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Syllabus progress relative to the expected pace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyllabusPace {
    Lagging,
    #[serde(rename = "On-Track")]
    OnTrack,
    Ahead,
}

pub fn normalize_branch_code(raw: Option<&str>) -> String {
    let normalized = match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_uppercase(),
        _ => return UNKNOWN_BRANCH.to_string(),
    };

    BRANCH_SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(normalized)
}

/// Coerce a percent-like cell ("85%", " 85 ", 85) into a number.
///
/// Only the first `%` is removed. Unparsable input yields 0.
pub fn normalize_percent(value: Option<&RawValue>) -> f64 {
    let n = match value {
        Some(RawValue::Number(n)) => *n,
        Some(RawValue::Text(s)) => parse_float_prefix(s.replacen('%', "", 1).trim()).unwrap_or(0.0),
        _ => 0.0,
    };

    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Coerce a count cell (week, sessions, topics) into an integer.
///
/// Text keeps its leading integer part ("5 sessions" -> 5, "5.7" -> 5),
/// numbers are truncated toward zero.
pub fn parse_count(value: Option<&RawValue>) -> i32 {
    match value {
        Some(RawValue::Number(n)) if n.is_finite() => n.trunc() as i32,
        Some(RawValue::Text(s)) => parse_int_prefix(s.trim()).unwrap_or(0),
        _ => 0,
    }
}

/// Additive risk score over attendance, pass rate and syllabus pace.
pub fn risk_level(attendance: f64, pass_percent: f64, pace: SyllabusPace) -> RiskLevel {
    let mut score = 0;

    if attendance < 65.0 {
        score += 2;
    } else if attendance < 75.0 {
        score += 1;
    }

    if pass_percent < 50.0 {
        score += 2;
    } else if pass_percent < 60.0 {
        score += 1;
    }

    if pace == SyllabusPace::Lagging {
        score += 1;
    }

    if score >= 3 {
        RiskLevel::Critical
    } else if score >= 1 {
        RiskLevel::NeedsAttention
    } else {
        RiskLevel::Healthy
    }
}

/// Pace from coverage: under half the syllabus covered is lagging.
pub fn syllabus_pace(covered: i32, total: i32) -> SyllabusPace {
    if total > 0 && (covered as f64 / total as f64) * 100.0 < 50.0 {
        SyllabusPace::Lagging
    } else {
        SyllabusPace::OnTrack
    }
}

/// Parse the longest numeric prefix of `s` (sign, digits, fraction, exponent).
fn parse_float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return None;
    }

    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

fn parse_int_prefix(s: &str) -> Option<i32> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }

    let n: i64 = s[..end].parse().ok()?;
    Some(n.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}
