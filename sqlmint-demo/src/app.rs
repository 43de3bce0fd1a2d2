use std::io::Write;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use eyre::Context;
use sqlmint::{
    Columns, FromSqlxRow, Repository, Session,
    dialect::Dialect,
    entity::{Entity, column::ComparableColumn, relation::HasMany},
    query::{parse::ParseFromRow, raw::Raw},
};
use sqlx::{Database, Executor, Pool};
use tracing::info;

use crate::models::{Article, Author, author};

/// How the articles of an author are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Fetch the author, then query its articles through the relation.
    #[default]
    Lazy,
    /// Fetch the author and eager load its articles in one extra query.
    Eager,
    /// A single hand-written join.
    Join,
}

/// One row of the author/article join. Article columns are `NULL` for authors without articles.
#[derive(FromSqlxRow, Debug, Clone, PartialEq)]
pub struct AuthorArticle {
    pub author_id: i32,
    pub author_email: String,
    pub author_name: String,
    pub article_id: Option<i32>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

const AUTHOR_ARTICLES: &str = r#"SELECT "author"."id" AS "author_id", "author"."email" AS "author_email", "author"."name" AS "author_name", "article"."id" AS "article_id", "article"."title" AS "title", "article"."body" AS "body", "article"."created_at" AS "created_at" FROM "author" LEFT JOIN "article" ON "article"."author_id" = "author"."id" WHERE "author"."id" = $1 ORDER BY "article"."id""#;

/// Fold the rows of the join into an author with its articles.
///
/// # Errors
///
/// [`sqlmint::Error::NotFound`] if `rows` is empty.
pub fn collect_join(rows: Vec<AuthorArticle>) -> sqlmint::Result<Author> {
    let Some(first) = rows.first() else {
        return Err(sqlmint::Error::NotFound {
            table: Author::TABLE_NAME,
        });
    };

    let mut author = Author {
        id: first.author_id,
        email: first.author_email.clone(),
        name: first.author_name.clone(),
        articles: vec![],
    };

    author.articles = rows
        .into_iter()
        .filter_map(|row| {
            Some(Article {
                id: row.article_id?,
                title: row.title.unwrap_or_default(),
                body: row.body,
                author_id: row.author_id,
                created_at: row.created_at,
                author: None,
            })
        })
        .collect();

    Ok(author)
}

pub struct App<DB>
where
    DB: Dialect,
{
    pool: Pool<DB>,
    authors: Repository<Author, DB>,
    articles: Repository<Article, DB>,
}

impl<DB> App<DB>
where
    DB: Dialect,
    for<'e> &'e mut <DB as Database>::Connection: Executor<'e, Database = DB>,
    AuthorArticle: ParseFromRow<DB>,
{
    #[must_use]
    pub fn new(pool: Pool<DB>, session: &Session) -> Self {
        Self {
            pool,
            authors: session.repository(),
            articles: session.repository(),
        }
    }

    #[must_use]
    pub const fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    #[must_use]
    pub const fn authors(&self) -> &Repository<Author, DB> {
        &self.authors
    }

    #[must_use]
    pub const fn articles(&self) -> &Repository<Article, DB> {
        &self.articles
    }

    /// # Errors
    ///
    /// If the author could not be inserted.
    pub async fn create_author(&self, name: &str, email: &str) -> eyre::Result<Author> {
        let mut author = Author::new(name, email);

        self.authors
            .insert(&self.pool, &mut author, &Columns::Infer)
            .await
            .wrap_err("Failed to create author")?;

        info!(id = author.id, name = %author.name, "created author");

        Ok(author)
    }

    /// Insert `articles` as children of `author` within a single transaction.
    ///
    /// # Errors
    ///
    /// If any article could not be inserted, in which case none are.
    pub async fn add_articles(&self, author: &mut Author, articles: Vec<Article>) -> eyre::Result<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .wrap_err("Failed to start transaction")?;

        self.authors
            .add_children(&self.articles, &mut *transaction, author, true, articles)
            .await
            .wrap_err("Failed to create articles")?;

        transaction
            .commit()
            .await
            .wrap_err("Failed to commit articles")?;

        info!(
            author = author.id,
            count = author.articles.len(),
            "created articles"
        );

        Ok(())
    }

    /// Fetch an author together with its articles.
    ///
    /// # Errors
    ///
    /// [`sqlmint::Error::NotFound`] if there is no such author, or if there's been a problem
    /// communicating with the database.
    pub async fn author_with_articles(
        &self,
        author_id: i32,
        strategy: Strategy,
    ) -> sqlmint::Result<Author> {
        match strategy {
            Strategy::Lazy => {
                let mut author = self.authors.find(&self.pool, author_id).await?;
                author.articles = self.articles.all(&self.pool, author.related()).await?;

                Ok(author)
            }
            Strategy::Eager => {
                let mut authors = self
                    .authors
                    .all(
                        &self.pool,
                        Author::find().filter(author::columns::Id::eq(author_id)),
                    )
                    .await?;

                self.authors
                    .load_into(&self.articles, &self.pool, &mut authors)
                    .await?;

                authors.into_iter().next().ok_or(sqlmint::Error::NotFound {
                    table: Author::TABLE_NAME,
                })
            }
            Strategy::Join => {
                let rows = Raw::new(AUTHOR_ARTICLES)
                    .bind(author_id)
                    .fetch_all::<AuthorArticle, DB, _>(&self.pool)
                    .await?;

                collect_join(rows)
            }
        }
    }

    /// Create an author with two articles, then print it back using `strategy`.
    ///
    /// # Errors
    ///
    /// If any database operation fails, or the output could not be written.
    pub async fn run(&self, strategy: Strategy, out: &mut impl Write) -> eyre::Result<()> {
        let mut author = self
            .create_author("John Doe", "johndoe@email.com")
            .await?;

        let articles = (0..2)
            .map(|_| {
                Article::new(
                    "Hello World",
                    Some("Hello world, this is an article.".to_string()),
                )
            })
            .collect();

        self.add_articles(&mut author, articles).await?;

        let author = self
            .author_with_articles(author.id, strategy)
            .await
            .wrap_err("Failed to fetch author")?;

        render_text(&author, out)?;

        Ok(())
    }
}

/// Print `author` and its articles in a human readable form.
///
/// # Errors
///
/// If writing to `out` fails.
pub fn render_text(author: &Author, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "Author: \n\tID:{} \n\tName:{} \n\tEmail:{}",
        author.id, author.name, author.email
    )?;

    for article in &author.articles {
        writeln!(
            out,
            "Article: \n\tID:{} \n\tTitle:{} \n\tBody:{} \n\tCreatedAt:{}",
            article.id,
            article.title,
            article.body.as_deref().unwrap_or_default(),
            article
                .created_at
                .map(|e| e.to_rfc3339())
                .unwrap_or_default()
        )?;
    }

    Ok(())
}

/// Print `author` and its articles as a single JSON document.
///
/// # Errors
///
/// If serialization or writing to `out` fails.
pub fn render_json(author: &Author, out: &mut impl Write) -> eyre::Result<()> {
    serde_json::to_writer_pretty(&mut *out, author).wrap_err("Failed to serialize author")?;
    writeln!(out)?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::{AuthorArticle, collect_join, render_text};
    use crate::models::{Article, Author};

    fn row(article_id: Option<i32>, title: Option<&str>) -> AuthorArticle {
        AuthorArticle {
            author_id: 7,
            author_email: "johndoe@email.com".to_string(),
            author_name: "John Doe".to_string(),
            article_id,
            title: title.map(ToString::to_string),
            body: None,
            created_at: None,
        }
    }

    #[test]
    fn test_collect_join() {
        let author = collect_join(vec![row(Some(1), Some("a")), row(Some(2), Some("b"))]).unwrap();

        assert_eq!(author.id, 7);
        assert_eq!(author.name, "John Doe");
        assert_eq!(
            author
                .articles
                .iter()
                .map(|e| (e.id, e.title.as_str(), e.author_id))
                .collect::<Vec<_>>(),
            vec![(1, "a", 7), (2, "b", 7)]
        );
    }

    #[test]
    fn test_collect_join_without_articles() {
        let author = collect_join(vec![row(None, None)]).unwrap();

        assert_eq!(author.id, 7);
        assert!(author.articles.is_empty());
    }

    #[test]
    fn test_collect_join_empty() {
        assert!(collect_join(vec![]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_render_text() {
        let author = Author {
            id: 1,
            articles: vec![Article {
                id: 3,
                author_id: 1,
                ..Article::new("Hello World", Some("Body".to_string()))
            }],
            ..Author::new("John Doe", "johndoe@email.com")
        };

        let mut out: Vec<u8> = vec![];
        render_text(&author, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Author: \n\tID:1 \n\tName:John Doe \n\tEmail:johndoe@email.com\nArticle: \n\tID:3 \n\tTitle:Hello World \n\tBody:Body \n\tCreatedAt:\n"
        );
    }
}
