//! Runtime language selection and string lookup.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

/// Which path chose the effective language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageSource {
    /// Persisted configuration override.
    Override,
    /// Derived from the host UI culture.
    UiCulture,
}

pub struct LocalizationService {
    language: String,
    source: LanguageSource,
    strings: HashMap<String, String>,
}

impl LocalizationService {
    /// Choose the effective language and load its string map.
    ///
    /// The configuration override wins when present; otherwise the
    /// language derives from the host UI culture. A missing string file
    /// is not an error — lookups fall back to the key.
    pub fn new(asset_dir: &Path, language_override: Option<&str>) -> Self {
        let (language, source) = match language_override {
            Some(lang) if !lang.is_empty() => (lang.to_string(), LanguageSource::Override),
            _ => (Self::ui_culture_language(), LanguageSource::UiCulture),
        };
        info!("Language: {} ({:?})", language, source);

        let strings = Self::load_strings(asset_dir, &language);
        Self {
            language,
            source,
            strings,
        }
    }

    /// Two-letter language tag of the host UI culture.
    fn ui_culture_language() -> String {
        // POSIX-style "de_DE.UTF-8" and BCP-47 "de-DE" both reduce to the
        // primary subtag.
        std::env::var("LANG")
            .ok()
            .and_then(|value| {
                let tag: String = value
                    .chars()
                    .take_while(|c| c.is_ascii_alphabetic())
                    .collect();
                (!tag.is_empty()).then(|| tag.to_ascii_lowercase())
            })
            .unwrap_or_else(|| "en".to_string())
    }

    fn load_strings(asset_dir: &Path, language: &str) -> HashMap<String, String> {
        let path = asset_dir.join("loc").join(format!("{language}.json"));
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                debug!("No localization file at {:?}: {}", path, e);
                return HashMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!("Ignoring malformed localization file {:?}: {}", path, e);
                HashMap::new()
            }
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn source(&self) -> LanguageSource {
        self.source
    }

    /// Look up a localized string, falling back to the key itself.
    pub fn get<'a>(&'a self, key: &'a str) -> &'a str {
        self.strings.get(key).map(String::as_str).unwrap_or(key)
    }
}
