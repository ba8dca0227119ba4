use serde::{Deserialize, Serialize};

/// The initiative types every new store starts with.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "sponsorship",
    "raffle",
    "weekly",
    "event",
    "donation",
    "merchandise",
    "other",
];

/// The type used for sheet rows that have no type.
pub const FALLBACK_CATEGORY: &str = "other";

/// The ordered, open-ended set of initiative types. Labels are stored lowercase and are unique.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Categories(Vec<String>);

impl Default for Categories {
    fn default() -> Self {
        Self(DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect())
    }
}

impl Categories {
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, label: &str) -> bool {
        let wanted = normalize(label);
        self.0.iter().any(|l| *l == wanted)
    }

    /// Appends the normalized `label`. Returns `false`, changing nothing, when it already exists.
    pub(crate) fn insert(&mut self, label: &str) -> bool {
        if self.contains(label) {
            return false;
        }
        self.0.push(normalize(label));
        true
    }
}

/// Lowercases and trims a label.
pub(crate) fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}
