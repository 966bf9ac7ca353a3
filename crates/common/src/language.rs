//! Target languages for machine translation

use serde::{Deserialize, Serialize};
use std::fmt;

/// A translation target.
///
/// Posts are translated into every variant; comments only into
/// [`Language::Chinese`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Chinese,
    French,
    Japanese,
    Italian,
    Russian,
    Korean,
    Spanish,
}

impl Language {
    /// All post languages, in column order
    pub const ALL: [Language; 7] = [
        Language::Chinese,
        Language::French,
        Language::Japanese,
        Language::Italian,
        Language::Russian,
        Language::Korean,
        Language::Spanish,
    ];

    /// Languages comments are translated into
    pub const COMMENT: [Language; 1] = [Language::Chinese];

    /// Code sent to the translation backend
    pub fn code(self) -> &'static str {
        match self {
            Language::Chinese => "zh-CN",
            Language::French => "fr",
            Language::Japanese => "ja",
            Language::Italian => "it",
            Language::Russian => "ru",
            Language::Korean => "ko",
            Language::Spanish => "es",
        }
    }

    /// Suffix of the storage column holding this translation (`title_zh`, ...)
    pub fn suffix(self) -> &'static str {
        match self {
            Language::Chinese => "zh",
            Language::French => "fr",
            Language::Japanese => "ja",
            Language::Italian => "it",
            Language::Russian => "ru",
            Language::Korean => "ko",
            Language::Spanish => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let mut codes: Vec<_> = Language::ALL.iter().map(|l| l.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), Language::ALL.len());
    }

    #[test]
    fn test_chinese_uses_regional_code() {
        assert_eq!(Language::Chinese.code(), "zh-CN");
        assert_eq!(Language::Chinese.suffix(), "zh");
        assert_eq!(Language::COMMENT, [Language::Chinese]);
    }
}
