//! Intent catalog: label -> canonical phrases
//!
//! Built once at startup from the compiled-in defaults or a JSON file of the
//! shape `{"intent_label": ["phrase", ...]}`, then read-only for the process
//! lifetime. Phrases are normalized (lower-cased, trimmed) on insert and must
//! be unique across the whole catalog.

use std::collections::BTreeMap;
use std::path::Path;

use super::RouterError;

/// Read-only mapping of intent label to canonical example phrases
#[derive(Debug, Clone, Default)]
pub struct IntentCatalog {
    // BTreeMap keeps label iteration order stable, which makes the embedding
    // index order (and therefore tie-breaking) deterministic.
    entries: BTreeMap<String, Vec<String>>,
}

impl IntentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one intent with its canonical phrases.
    ///
    /// Phrases are normalized before storage. A phrase already present under
    /// any label (including this one) is rejected.
    pub fn insert<I, S>(&mut self, label: &str, phrases: I) -> Result<(), RouterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for phrase in phrases {
            let normalized = normalize(phrase.as_ref());
            if normalized.is_empty() {
                continue;
            }
            if let Some(owner) = self.label_of(&normalized) {
                return Err(RouterError::DuplicatePhrase {
                    phrase: normalized,
                    first: owner.to_string(),
                    second: label.to_string(),
                });
            }
            self.entries
                .entry(label.to_string())
                .or_default()
                .push(normalized);
        }
        Ok(())
    }

    /// Parse a catalog from its JSON representation
    pub fn from_json(raw: &str) -> Result<Self, RouterError> {
        let parsed: BTreeMap<String, Vec<String>> =
            serde_json::from_str(raw).map_err(RouterError::CatalogParse)?;
        let mut catalog = Self::new();
        for (label, phrases) in parsed {
            catalog.insert(&label, phrases)?;
        }
        Ok(catalog)
    }

    /// Load a catalog from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, RouterError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| RouterError::CatalogIo(path.display().to_string(), e))?;
        Self::from_json(&raw)
    }

    /// Iterate `(label, phrase)` pairs in deterministic order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(label, phrases)| {
            phrases.iter().map(move |p| (label.as_str(), p.as_str()))
        })
    }

    pub fn phrase_count(&self) -> usize {
        self.entries.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn label_of(&self, normalized_phrase: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| p == normalized_phrase))
            .map(|(label, _)| label.as_str())
    }
}

/// Normalize an utterance or catalog phrase: case-fold and trim
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// The compiled-in command catalog.
///
/// Phrases are similarity anchors, not an exhaustive grammar - a handful of
/// natural wordings per intent is enough for the embedding match.
pub fn default_catalog() -> IntentCatalog {
    let mut catalog = IntentCatalog::new();
    let intents: &[(&str, &[&str])] = &[
        (
            "wake_up",
            &["wake up", "are you there", "hello assistant", "hey aria"],
        ),
        (
            "exit",
            &["goodbye", "exit now", "shut yourself down", "stop listening forever"],
        ),
        (
            "sleep",
            &["go to sleep", "take a nap", "sleep now", "stand by"],
        ),
        ("yes", &["yes", "yes please", "sure", "go ahead", "confirm"]),
        ("no", &["no", "no thanks", "cancel that", "never mind"]),
        (
            "increase_volume",
            &["increase the volume", "turn up the volume", "louder please", "volume up"],
        ),
        (
            "decrease_volume",
            &["decrease the volume", "turn down the volume", "quieter please", "volume down"],
        ),
        (
            "increase_brightness",
            &["increase the brightness", "brighten the screen", "brightness up"],
        ),
        (
            "decrease_brightness",
            &["decrease the brightness", "dim the screen", "brightness down"],
        ),
        (
            "current_datetime",
            &["what time is it", "current time please", "which day is today", "today's date please"],
        ),
        (
            "greeting",
            &["good morning", "good evening", "greet me"],
        ),
        (
            "uptime",
            &["how long has the system been running", "system uptime please"],
        ),
        (
            "add_reminder",
            &[
                "set a reminder",
                "remind me to drink water at 10 am",
                "add a new reminder",
            ],
        ),
        (
            "list_reminders",
            &["list my reminders", "show my reminders", "which reminders are set"],
        ),
        (
            "change_voice",
            &["change your voice", "use another voice", "switch the voice model"],
        ),
        (
            "take_screenshot",
            &["take a screenshot", "capture the screen", "screenshot please"],
        ),
        (
            "change_wallpaper",
            &["change the wallpaper", "set a new wallpaper", "pick another wallpaper"],
        ),
        (
            "motivation",
            &["motivate me", "give me some motivation", "say something encouraging"],
        ),
        (
            "play_music",
            &["play some music", "start the music", "put on a song"],
        ),
        (
            "stop_music",
            &["stop the music", "pause the music", "silence the music"],
        ),
    ];

    for (label, phrases) in intents {
        // The built-in table has no duplicates; a failure here is a
        // programming error caught by the unit tests.
        catalog
            .insert(label, phrases.iter().copied())
            .expect("built-in catalog contains a duplicate phrase");
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_builds() {
        let catalog = default_catalog();
        assert!(!catalog.is_empty());
        assert!(catalog.phrase_count() > 30);
    }

    #[test]
    fn test_phrases_normalized() {
        let mut catalog = IntentCatalog::new();
        catalog.insert("greet", ["  Good Morning  "]).unwrap();
        let pairs: Vec<_> = catalog.iter().collect();
        assert_eq!(pairs, vec![("greet", "good morning")]);
    }

    #[test]
    fn test_duplicate_across_labels_rejected() {
        let mut catalog = IntentCatalog::new();
        catalog.insert("a", ["play music"]).unwrap();
        let err = catalog.insert("b", ["Play Music"]).unwrap_err();
        match err {
            RouterError::DuplicatePhrase { phrase, first, second } => {
                assert_eq!(phrase, "play music");
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_within_label_rejected() {
        let mut catalog = IntentCatalog::new();
        let err = catalog.insert("a", ["hello there", "hello there"]).unwrap_err();
        assert!(matches!(err, RouterError::DuplicatePhrase { .. }));
    }

    #[test]
    fn test_from_json() {
        let raw = r#"{"joke": ["tell me a joke"], "news": ["read the news", "latest headlines"]}"#;
        let catalog = IntentCatalog::from_json(raw).unwrap();
        assert_eq!(catalog.phrase_count(), 3);
        let labels: Vec<_> = catalog.iter().map(|(l, _)| l).collect();
        // BTreeMap order: joke before news
        assert_eq!(labels, vec!["joke", "news", "news"]);
    }
}
