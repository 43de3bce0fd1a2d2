use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlmint::DatabaseModel;

use super::author::Author;

#[derive(DatabaseModel, Serialize, Clone, Debug, Default, PartialEq)]
#[sqlmint(table = "article", primary_key = id)]
pub struct Article {
    #[sqlmint(default)]
    pub id: i32,
    pub title: String,
    pub body: Option<String>,
    pub author_id: i32,
    #[sqlmint(default, immutable)]
    pub created_at: Option<DateTime<Utc>>,
    /// Filled in by the relationship loader, never written back.
    #[sqlmint(skip)]
    #[serde(skip)]
    pub author: Option<Arc<Author>>,
}

impl Article {
    pub fn new(title: impl Into<String>, body: Option<String>) -> Self {
        Self {
            title: title.into(),
            body,
            ..Self::default()
        }
    }
}
