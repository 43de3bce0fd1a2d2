use std::sync::Arc;

use serde::Serialize;
use sqlmint::{DatabaseModel, entity::relation::HasMany};

use super::article::{self, Article};

#[derive(DatabaseModel, Serialize, Clone, Debug, Default, PartialEq)]
#[sqlmint(table = "author", primary_key = id)]
pub struct Author {
    #[sqlmint(default)]
    pub id: i32,
    pub email: String,
    pub name: String,
    #[sqlmint(skip)]
    pub articles: Vec<Article>,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }
}

impl HasMany<Article> for Author {
    type ForeignKey = article::columns::AuthorId;

    fn children_mut(&mut self) -> &mut Vec<Article> {
        &mut self.articles
    }

    fn set_parent(child: &mut Article, parent: Arc<Self>) {
        child.author = Some(parent);
    }
}
