//! Post entity
//!
//! Canonical title/content plus one translated slot per [`Language`].
//! Translated slots are write-once: ingestion fills them only while empty.

use crate::language::Language;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub title: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub title_zh: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub title_fr: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub title_ja: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub title_it: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub title_ru: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub title_ko: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub title_es: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content_zh: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content_fr: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content_ja: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content_it: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content_ru: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content_ko: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub content_es: Option<String>,

    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub post_type: Option<String>,

    pub author_id: String,

    pub submolt_id: Option<String>,

    pub upvotes: i64,
    pub downvotes: i64,
    pub score: i64,
    pub comment_count: i64,

    /// Upstream ranking signal, distinct from `score`
    #[sea_orm(column_type = "Double")]
    pub hot_score: f64,

    pub is_pinned: bool,
    pub is_locked: bool,
    pub is_deleted: bool,

    pub created_at: DateTimeUtc,

    pub updated_at: Option<DateTimeUtc>,
}

/// Which canonical field a translated slot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostField {
    Title,
    Content,
}

impl Model {
    /// Record for a post seen for the first time; fields are filled by the caller
    pub fn blank(id: &str, author_id: &str, created_at: DateTimeUtc) -> Self {
        Self {
            id: id.to_owned(),
            title: None,
            title_zh: None,
            title_fr: None,
            title_ja: None,
            title_it: None,
            title_ru: None,
            title_ko: None,
            title_es: None,
            content: None,
            content_zh: None,
            content_fr: None,
            content_ja: None,
            content_it: None,
            content_ru: None,
            content_ko: None,
            content_es: None,
            post_type: None,
            author_id: author_id.to_owned(),
            submolt_id: None,
            upvotes: 0,
            downvotes: 0,
            score: 0,
            comment_count: 0,
            hot_score: 0.0,
            is_pinned: false,
            is_locked: false,
            is_deleted: false,
            created_at,
            updated_at: None,
        }
    }

    /// Canonical-language text of a field
    pub fn canonical(&self, field: PostField) -> Option<&str> {
        match field {
            PostField::Title => self.title.as_deref(),
            PostField::Content => self.content.as_deref(),
        }
    }

    /// Translated text of a field, if present
    pub fn translated(&self, field: PostField, language: Language) -> Option<&str> {
        let slot = match (field, language) {
            (PostField::Title, Language::Chinese) => &self.title_zh,
            (PostField::Title, Language::French) => &self.title_fr,
            (PostField::Title, Language::Japanese) => &self.title_ja,
            (PostField::Title, Language::Italian) => &self.title_it,
            (PostField::Title, Language::Russian) => &self.title_ru,
            (PostField::Title, Language::Korean) => &self.title_ko,
            (PostField::Title, Language::Spanish) => &self.title_es,
            (PostField::Content, Language::Chinese) => &self.content_zh,
            (PostField::Content, Language::French) => &self.content_fr,
            (PostField::Content, Language::Japanese) => &self.content_ja,
            (PostField::Content, Language::Italian) => &self.content_it,
            (PostField::Content, Language::Russian) => &self.content_ru,
            (PostField::Content, Language::Korean) => &self.content_ko,
            (PostField::Content, Language::Spanish) => &self.content_es,
        };
        slot.as_deref()
    }

    /// Mutable translated slot of a field
    pub fn translated_mut(&mut self, field: PostField, language: Language) -> &mut Option<String> {
        match (field, language) {
            (PostField::Title, Language::Chinese) => &mut self.title_zh,
            (PostField::Title, Language::French) => &mut self.title_fr,
            (PostField::Title, Language::Japanese) => &mut self.title_ja,
            (PostField::Title, Language::Italian) => &mut self.title_it,
            (PostField::Title, Language::Russian) => &mut self.title_ru,
            (PostField::Title, Language::Korean) => &mut self.title_ko,
            (PostField::Title, Language::Spanish) => &mut self.title_es,
            (PostField::Content, Language::Chinese) => &mut self.content_zh,
            (PostField::Content, Language::French) => &mut self.content_fr,
            (PostField::Content, Language::Japanese) => &mut self.content_ja,
            (PostField::Content, Language::Italian) => &mut self.content_it,
            (PostField::Content, Language::Russian) => &mut self.content_ru,
            (PostField::Content, Language::Korean) => &mut self.content_ko,
            (PostField::Content, Language::Spanish) => &mut self.content_es,
        }
    }
}

impl Column {
    /// Storage column of a translated slot
    pub fn translated(field: PostField, language: Language) -> Self {
        match (field, language) {
            (PostField::Title, Language::Chinese) => Column::TitleZh,
            (PostField::Title, Language::French) => Column::TitleFr,
            (PostField::Title, Language::Japanese) => Column::TitleJa,
            (PostField::Title, Language::Italian) => Column::TitleIt,
            (PostField::Title, Language::Russian) => Column::TitleRu,
            (PostField::Title, Language::Korean) => Column::TitleKo,
            (PostField::Title, Language::Spanish) => Column::TitleEs,
            (PostField::Content, Language::Chinese) => Column::ContentZh,
            (PostField::Content, Language::French) => Column::ContentFr,
            (PostField::Content, Language::Japanese) => Column::ContentJa,
            (PostField::Content, Language::Italian) => Column::ContentIt,
            (PostField::Content, Language::Russian) => Column::ContentRu,
            (PostField::Content, Language::Korean) => Column::ContentKo,
            (PostField::Content, Language::Spanish) => Column::ContentEs,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::author::Entity",
        from = "Column::AuthorId",
        to = "super::author::Column::Id"
    )]
    Author,

    #[sea_orm(
        belongs_to = "super::submolt::Entity",
        from = "Column::SubmoltId",
        to = "super::submolt::Column::Id"
    )]
    Submolt,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::submolt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Submolt.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
