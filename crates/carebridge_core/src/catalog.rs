//! Localized string catalog
//!
//! One flat JSON object per language (`<dir>/<language>.json`), mapping
//! catalog ids to display text.

use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default)]
pub struct StringCatalog {
    languages: HashMap<String, HashMap<String, String>>,
}

impl StringCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`; the file stem is the language code
    pub async fn load_dir(dir: &Path) -> Result<Self> {
        let mut catalog = Self::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| CoreError::catalog_load_failed(dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CoreError::catalog_load_failed(dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(language) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };

            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CoreError::catalog_load_failed(&path, e))?;
            let strings: HashMap<String, String> = serde_json::from_str(&content)
                .map_err(|e| CoreError::catalog_load_failed(&path, e))?;

            debug!(language, strings = strings.len(), "Loaded string catalog");
            catalog.languages.insert(language.to_string(), strings);
        }

        info!(
            dir = %dir.display(),
            languages = ?catalog.languages(),
            "Loaded string catalogs"
        );
        Ok(catalog)
    }

    /// Add or replace a language from `(id, text)` pairs
    pub fn with_language<I, K, V>(mut self, language: impl Into<String>, strings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.languages.insert(
            language.into(),
            strings
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn resolve(&self, language: &str, id: &str) -> Option<&str> {
        self.languages
            .get(language)
            .and_then(|strings| strings.get(id))
            .map(String::as_str)
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.languages.contains_key(language)
    }

    /// Language codes, sorted
    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    /// Fails with `MissingLanguage` unless `language` is loaded
    pub fn require_language(&self, language: &str) -> Result<()> {
        if self.has_language(language) {
            Ok(())
        } else {
            Err(CoreError::missing_language(
                language,
                self.languages().into_iter().map(str::to_string).collect(),
            ))
        }
    }
}
