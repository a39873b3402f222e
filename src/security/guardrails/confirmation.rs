use super::types::{ConfirmationKind, SafetyCheck};
use crate::tools::ToolParams;

const SIMPLE_AFFIRMATIVES: &[&str] = &["yes", "y", "ok", "okay", "sure"];

const DETAILED_AFFIRMATIVES: &[&str] = &[
    "yes",
    "y",
    "ok",
    "okay",
    "sure",
    "confirm",
    "confirmed",
    "proceed",
    "go ahead",
    "do it",
    "approve",
    "approved",
    "yep",
    "yeah",
    "affirmative",
];

/// Words that may trail a detailed affirmative without changing its meaning.
const POLITE_FILLER: &[&str] = &["please", "thanks", "thank", "you", "now"];

/// Map a free-text reply to an approval for the given check.
///
/// A check that asks for no confirmation accepts any reply.
pub fn validate_confirmation(response: &str, action: &str, check: &SafetyCheck) -> bool {
    let Some(kind) = check.confirmation_type.filter(|_| check.requires_confirmation) else {
        return true;
    };
    let normalized = normalize(response);
    match kind {
        ConfirmationKind::Simple => SIMPLE_AFFIRMATIVES.contains(&normalized.as_str()),
        ConfirmationKind::Detailed => DETAILED_AFFIRMATIVES.iter().any(|phrase| {
            normalized.strip_prefix(phrase).is_some_and(|rest| {
                (rest.is_empty() || rest.starts_with(' '))
                    && rest.split_whitespace().all(|word| POLITE_FILLER.contains(&word))
            })
        }),
        ConfirmationKind::Explicit => {
            let phrase = format!("confirm {}", action.to_lowercase());
            response.to_lowercase().contains(&phrase)
        }
    }
}

/// Human-readable prompt carried by a confirmation-needed event.
pub fn confirmation_prompt(
    action: &str,
    description: &str,
    params: &ToolParams,
    kind: ConfirmationKind,
) -> String {
    match kind {
        ConfirmationKind::Simple => format!("{description}? (yes/no)"),
        ConfirmationKind::Detailed => {
            let rendered = if params.is_empty() {
                "no parameters".to_string()
            } else {
                params
                    .iter()
                    .map(|(key, value)| match value.as_str() {
                        Some(text) => format!("{key}={text}"),
                        None => format!("{key}={value}"),
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!("About to run '{action}' ({description}) with {rendered}. Proceed? (yes/no)")
        }
        ConfirmationKind::Explicit => format!(
            "'{action}' is a critical action ({description}). Say \"confirm {action}\" to proceed."
        ),
    }
}

fn normalize(response: &str) -> String {
    response
        .split_whitespace()
        .map(|word| word.trim_end_matches(['.', '!', ',']))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
