//! Urgency classification of completed model responses.
//!
//! Ordered keyword tiers over the lower-cased text. The first tier with a
//! hit wins, so a response mentioning both "999" and "GP" is an emergency.
//! Only ever called with a complete response.

use crate::models::UrgencyLabel;

const TIERS: &[(UrgencyLabel, &[&str])] = &[
    (UrgencyLabel::Emergency, &["emergency", "999", "life-threatening"]),
    (UrgencyLabel::Urgent, &["urgent", "111", "immediate"]),
    (UrgencyLabel::Standard, &["gp", "doctor", "appointment"]),
];

/// Characters of the response kept as the stored recommendation summary.
pub const RECOMMENDATION_CHARS: usize = 500;

pub fn classify_urgency(response: &str) -> UrgencyLabel {
    let lowered = response.to_lowercase();
    TIERS
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| lowered.contains(t)))
        .map(|(label, _)| *label)
        .unwrap_or(UrgencyLabel::SelfCare)
}

/// The first [`RECOMMENDATION_CHARS`] characters of `response`.
pub fn derive_recommendations(response: &str) -> String {
    response.chars().take(RECOMMENDATION_CHARS).collect()
}
