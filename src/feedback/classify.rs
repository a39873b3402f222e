use serde::{Deserialize, Serialize};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCategory {
    NotAvailable,
    PermissionError,
    Timeout,
    Connectivity,
    InvalidInput,
    StateConflict,
    Unknown,
}

// Checked in order; the first category with a matching keyword wins.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::NotAvailable,
        &[
            "not found",
            "not available",
            "unavailable",
            "no such",
            "does not exist",
            "not installed",
            "unsupported",
        ],
    ),
    (
        ErrorCategory::PermissionError,
        &[
            "permission",
            "denied",
            "unauthorized",
            "forbidden",
            "not allowed",
            "401",
            "403",
        ],
    ),
    (
        ErrorCategory::Timeout,
        &["timeout", "timed out", "deadline exceeded", "took too long"],
    ),
    (
        ErrorCategory::Connectivity,
        &[
            "connection",
            "network",
            "unreachable",
            "dns",
            "offline",
            "refused",
            "reset by peer",
        ],
    ),
    (
        ErrorCategory::InvalidInput,
        &[
            "invalid",
            "malformed",
            "bad request",
            "missing required",
            "parse",
            "400",
        ],
    ),
    (
        ErrorCategory::StateConflict,
        &["already", "conflict", "in use", "locked", "busy", "409"],
    ),
];

/// Heuristic cause of a tool failure, from its error text.
pub fn classify_error(error: &str) -> ErrorCategory {
    let lowered = error.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(kw)))
        .map_or(ErrorCategory::Unknown, |(category, _)| *category)
}
