//! Emergency keyword detection.
//!
//! A stateless, case-insensitive substring check run on patient free text
//! before any prompt is built. It is deliberately independent of the
//! urgency classifier, which only ever sees model output.

/// Built-in keyword list, used whenever no keywords are configured.
pub const DEFAULT_EMERGENCY_KEYWORDS: &[&str] = &[
    "chest pain",
    "difficulty breathing",
    "unconscious",
    "severe bleeding",
    "allergic reaction",
    "stroke symptoms",
    "heart attack",
    "suicide",
];

/// The resolved keyword set.
///
/// Keywords are trimmed and lower-cased on construction. An empty
/// configuration resolves to [`DEFAULT_EMERGENCY_KEYWORDS`] here, so callers
/// never need to handle the "missing" case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyKeywords {
    keywords: Vec<String>,
}

impl EmergencyKeywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        if keywords.is_empty() {
            return Self::default();
        }
        Self { keywords }
    }

    /// True if any keyword occurs in `text`, ignoring case.
    pub fn detect(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }
}

impl Default for EmergencyKeywords {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_EMERGENCY_KEYWORDS
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}
