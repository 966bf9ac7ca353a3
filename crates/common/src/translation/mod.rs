//! Translation capability abstraction
//!
//! Provides a unified interface over machine-translation backends:
//! - Google (public `translate_a/single` endpoint)
//! - Passthrough (no backend; used when translation is disabled)
//!
//! Translators never fail. A backend error yields [`Translation::Fallback`]
//! carrying the original text, and callers decide whether to keep it.

use crate::config::TranslationConfig;
use crate::language::Language;
use crate::metrics;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of a translation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    /// Text produced by the backend
    Translated(String),
    /// Original (possibly truncated) text; the backend was not used or failed
    Fallback(String),
}

impl Translation {
    /// Translated text, `None` for a fallback
    pub fn translated(self) -> Option<String> {
        match self {
            Translation::Translated(text) => Some(text),
            Translation::Fallback(_) => None,
        }
    }

    pub fn is_translated(&self) -> bool {
        matches!(self, Translation::Translated(_))
    }
}

/// Trait for machine translation
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target`
    async fn translate(&self, text: &str, target: Language) -> Translation;

    /// Backend name, used in logs and metrics
    fn provider_name(&self) -> &str;
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Client for Google's public translation endpoint
pub struct GoogleTranslator {
    client: reqwest::Client,
    base_url: String,
    max_chars: usize,
}

impl GoogleTranslator {
    /// Create a new translator from configuration
    pub fn new(config: &TranslationConfig) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_chars: config.max_chars,
        })
    }

    async fn request(&self, text: &str, target: Language) -> crate::Result<String> {
        let url = format!("{}/translate_a/single", self.base_url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", target.code()),
                ("dt", "t"),
            ])
            .form(&[("q", text)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(crate::AppError::Translation {
                message: format!("API error {}", response.status()),
            });
        }

        let body: serde_json::Value = response.json().await?;
        parse_segments(&body).ok_or_else(|| crate::AppError::Translation {
            message: "Unexpected response shape".to_string(),
        })
    }
}

/// Join the translated segments of a `translate_a/single` response.
///
/// The payload is a nested array whose first element lists
/// `[translated, original, ...]` segments.
fn parse_segments(body: &serde_json::Value) -> Option<String> {
    let segments = body.get(0)?.as_array()?;

    let text: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(|s| s.as_str()))
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, target: Language) -> Translation {
        if text.is_empty() {
            return Translation::Fallback(String::new());
        }

        let text = truncate_chars(text, self.max_chars);

        match self.request(text, target).await {
            Ok(translated) => {
                metrics::record_translation(self.provider_name(), true);
                Translation::Translated(translated)
            }
            Err(e) => {
                tracing::warn!(
                    language = target.code(),
                    chars = text.chars().count(),
                    error = %e,
                    "Translation failed, keeping original text"
                );
                metrics::record_translation(self.provider_name(), false);
                Translation::Fallback(text.to_string())
            }
        }
    }

    fn provider_name(&self) -> &str {
        "google"
    }
}

/// Translator that never calls a backend
#[derive(Debug, Default)]
pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn translate(&self, text: &str, _target: Language) -> Translation {
        Translation::Fallback(text.to_string())
    }

    fn provider_name(&self) -> &str {
        "passthrough"
    }
}

/// Create a translator based on configuration
pub fn create_translator(config: &TranslationConfig) -> crate::Result<Arc<dyn Translator>> {
    if !config.enabled {
        return Ok(Arc::new(PassthroughTranslator));
    }

    match config.provider.as_str() {
        "google" => Ok(Arc::new(GoogleTranslator::new(config)?)),
        "passthrough" => Ok(Arc::new(PassthroughTranslator)),
        other => {
            tracing::warn!(provider = other, "Unknown translation provider, using passthrough");
            Ok(Arc::new(PassthroughTranslator))
        }
    }
}
