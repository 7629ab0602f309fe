#![forbid(unsafe_code)]

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

/// First violated input rule. `reason` is the caller-facing message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractViolation {
    #[error("{reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{reason}")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
        reason: &'static str,
    },
    #[error("{reason}")]
    NotFinite {
        field: &'static str,
        reason: &'static str,
    },
}

impl ContractViolation {
    pub fn field(&self) -> &'static str {
        match self {
            ContractViolation::InvalidValue { field, .. }
            | ContractViolation::InvalidRange { field, .. }
            | ContractViolation::NotFinite { field, .. } => *field,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ContractViolation::InvalidValue { reason, .. }
            | ContractViolation::InvalidRange { reason, .. }
            | ContractViolation::NotFinite { reason, .. } => *reason,
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Checks the length of `value` after trimming, in UTF-16 code units so that
/// limits match what browser clients count.
pub fn validate_trimmed_len(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
    reason: &'static str,
) -> Result<(), ContractViolation> {
    let len = value.trim().encode_utf16().count();
    if len < min || len > max {
        return Err(ContractViolation::InvalidValue { field, reason });
    }
    Ok(())
}

pub fn validate_coordinate(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
    reason: &'static str,
) -> Result<(), ContractViolation> {
    if !value.is_finite() {
        return Err(ContractViolation::NotFinite { field, reason });
    }
    if value < min || value > max {
        return Err(ContractViolation::InvalidRange {
            field,
            min,
            max,
            got: value,
            reason,
        });
    }
    Ok(())
}

pub fn is_well_formed_email(raw: &str) -> bool {
    let s = raw.trim();
    if s.is_empty() || s.len() > 254 || s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || local.len() > 64 || domain.contains('@') {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let tld_ok = labels
        .last()
        .map(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);
    tld_ok
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Accepts an optional leading `+`, common separators and 7 to 15 digits.
pub fn is_well_formed_phone(raw: &str) -> bool {
    let s = raw.trim();
    let body = s.strip_prefix('+').unwrap_or(s);
    let mut digits = 0usize;
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '(' | ')' | '.' => {}
            _ => return false,
        }
    }
    (7..=15).contains(&digits)
}
