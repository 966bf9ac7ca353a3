//! Per-cycle staging map
//!
//! Records resolved during a batch live here until the batch is flushed.
//! A lookup consults the staged records first and only queries storage on a
//! miss, so an id that appears twice in one batch resolves to the same
//! in-progress record.

use moltwatch_common::db::models::{AuthorEntity, CommentEntity, PostEntity, SubmoltEntity};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, PrimaryKeyTrait};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Where a resolved record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Already staged earlier in this batch
    Staged,
    /// Loaded from storage
    Stored,
    /// New in this batch
    Created,
}

/// A staged record and whether its row already exists in storage
#[derive(Debug, Clone)]
pub struct Staged<M> {
    pub record: M,
    pub persisted: bool,
}

/// Staged records of one entity, in first-seen order
pub struct Table<E: EntityTrait> {
    rows: HashMap<String, Staged<E::Model>>,
    order: Vec<String>,
}

impl<E> Table<E>
where
    E: EntityTrait,
    String: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Resolve `id` to a mutable staged record, loading it from storage or
    /// creating it with `create` when it is not staged yet
    pub async fn resolve<C, F>(
        &mut self,
        id: &str,
        db: &C,
        create: F,
    ) -> Result<(&mut E::Model, Origin), DbErr>
    where
        C: ConnectionTrait,
        F: FnOnce() -> E::Model,
    {
        match self.rows.entry(id.to_owned()) {
            Entry::Occupied(entry) => Ok((&mut entry.into_mut().record, Origin::Staged)),
            Entry::Vacant(entry) => {
                let stored = E::find_by_id(id.to_owned()).one(db).await?;
                self.order.push(id.to_owned());

                let (staged, origin) = match stored {
                    Some(record) => (Staged { record, persisted: true }, Origin::Stored),
                    None => (Staged { record: create(), persisted: false }, Origin::Created),
                };
                Ok((&mut entry.insert(staged).record, origin))
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&E::Model> {
        self.rows.get(id).map(|staged| &staged.record)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut E::Model> {
        self.rows.get_mut(id).map(|staged| &mut staged.record)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Staged records in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &Staged<E::Model>> {
        self.order.iter().filter_map(|id| self.rows.get(id))
    }

    /// Drain the staged records in first-seen order
    pub fn into_rows(mut self) -> Vec<Staged<E::Model>> {
        self.order
            .iter()
            .filter_map(|id| self.rows.remove(id))
            .collect()
    }
}

impl<E> Default for Table<E>
where
    E: EntityTrait,
    String: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Staging tables for one batch
#[derive(Default)]
pub struct StagingMap {
    pub authors: Table<AuthorEntity>,
    pub submolts: Table<SubmoltEntity>,
    pub posts: Table<PostEntity>,
    pub comments: Table<CommentEntity>,
}

impl StagingMap {
    pub fn new() -> Self {
        Self::default()
    }
}
