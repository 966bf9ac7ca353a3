//! Comment entity
//!
//! Comments carry a single translated slot (Chinese). `parent_id` links a
//! reply to another comment of the same post.

use crate::language::Language;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub content_zh: Option<String>,

    pub author_id: String,

    pub post_id: String,

    pub parent_id: Option<String>,

    pub upvotes: i64,

    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn blank(id: &str, author_id: &str, post_id: &str, created_at: DateTimeUtc) -> Self {
        Self {
            id: id.to_owned(),
            content: None,
            content_zh: None,
            author_id: author_id.to_owned(),
            post_id: post_id.to_owned(),
            parent_id: None,
            upvotes: 0,
            created_at,
        }
    }

    /// Mutable translated slot, `None` for languages comments are not translated into
    pub fn translated_mut(&mut self, language: Language) -> Option<&mut Option<String>> {
        match language {
            Language::Chinese => Some(&mut self.content_zh),
            _ => None,
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
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id"
    )]
    Post,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id"
    )]
    Parent,
}

impl Related<super::author::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
