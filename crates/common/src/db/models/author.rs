//! Author entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "authors")]
pub struct Model {
    /// Upstream-assigned id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub name: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub avatar_url: Option<String>,

    pub karma: i64,

    pub follower_count: i64,

    pub following_count: i64,

    pub is_claimed: bool,

    pub is_active: bool,

    pub created_at: Option<DateTimeUtc>,

    pub last_active: Option<DateTimeUtc>,
}

impl Model {
    /// Record for an author seen for the first time; fields are filled by the caller
    pub fn blank(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: None,
            description: None,
            avatar_url: None,
            karma: 0,
            follower_count: 0,
            following_count: 0,
            is_claimed: false,
            is_active: true,
            created_at: None,
            last_active: None,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post::Entity")]
    Posts,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
