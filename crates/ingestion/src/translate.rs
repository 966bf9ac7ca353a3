//! Write-once filling of translated slots
//!
//! A slot is filled only while it is empty and its canonical field has
//! text. Cache-sourced batches copy the canonical text verbatim and never
//! reach the translator.

use moltwatch_common::db::models::{Comment, Post, PostField};
use moltwatch_common::{Language, Translator};

/// How empty slots get their text
#[derive(Clone, Copy)]
pub enum SlotFiller<'a> {
    /// Ask the translation backend; failures leave the slot empty
    Translate(&'a dyn Translator),
    /// Copy the canonical text
    Verbatim,
}

impl<'a> SlotFiller<'a> {
    pub fn new(translator: &'a dyn Translator, from_cache: bool) -> Self {
        if from_cache {
            SlotFiller::Verbatim
        } else {
            SlotFiller::Translate(translator)
        }
    }

    async fn fill(&self, slot: &mut Option<String>, canonical: &str, language: Language) -> bool {
        if canonical.is_empty() || slot.as_deref().is_some_and(|s| !s.is_empty()) {
            return false;
        }

        let text = match self {
            SlotFiller::Verbatim => Some(canonical.to_string()),
            SlotFiller::Translate(translator) => {
                translator.translate(canonical, language).await.translated()
            }
        };

        match text {
            Some(text) => {
                *slot = Some(text);
                true
            }
            None => false,
        }
    }
}

/// Fill the empty title and content slots of a post in every language.
/// Returns the number of slots filled.
pub async fn fill_post(post: &mut Post, filler: SlotFiller<'_>) -> usize {
    let mut filled = 0;

    for field in [PostField::Title, PostField::Content] {
        let Some(canonical) = post.canonical(field).map(str::to_owned) else {
            continue;
        };

        for language in Language::ALL {
            if filler
                .fill(post.translated_mut(field, language), &canonical, language)
                .await
            {
                filled += 1;
            }
        }
    }

    filled
}

/// Fill the empty translated slots of a comment. Returns the number filled.
pub async fn fill_comment(comment: &mut Comment, filler: SlotFiller<'_>) -> usize {
    let Some(canonical) = comment.content.clone() else {
        return 0;
    };

    let mut filled = 0;
    for language in Language::COMMENT {
        let Some(slot) = comment.translated_mut(language) else {
            continue;
        };
        if filler.fill(slot, &canonical, language).await {
            filled += 1;
        }
    }

    filled
}
