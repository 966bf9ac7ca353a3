//! SeaORM entity models
//!
//! Database entities for MoltWatch. Ids are assigned upstream.

mod author;
mod comment;
mod post;
mod submolt;

pub use author::{
    Entity as AuthorEntity,
    Model as Author,
    ActiveModel as AuthorActiveModel,
    Column as AuthorColumn,
};

pub use submolt::{
    Entity as SubmoltEntity,
    Model as Submolt,
    ActiveModel as SubmoltActiveModel,
    Column as SubmoltColumn,
};

pub use post::{
    Entity as PostEntity,
    Model as Post,
    ActiveModel as PostActiveModel,
    Column as PostColumn,
    PostField,
};

pub use comment::{
    Entity as CommentEntity,
    Model as Comment,
    ActiveModel as CommentActiveModel,
    Column as CommentColumn,
};
