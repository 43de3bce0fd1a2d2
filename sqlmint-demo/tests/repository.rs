use sqlmint::{
    Columns, Error, Session, SessionConfig, UpsertOptions,
    entity::{
        Entity,
        column::{Column, ComparableColumn},
        hooks::HookPoint,
    },
    error::Operation,
};
use sqlmint_demo::{
    db::{DbType, connect_sqlite},
    models::{Article, Author, article, author},
    schema,
};
use sqlx::{Sqlite, SqlitePool};

async fn setup() -> SqlitePool {
    let pool = connect_sqlite("sqlite::memory:").await.unwrap();
    schema::bootstrap(&pool, DbType::Sqlite).await.unwrap();
    pool
}

async fn author(session: &Session, pool: &SqlitePool, name: &str) -> Author {
    let mut author = Author::new(name, format!("{}@email.com", name.to_lowercase()));
    session
        .repository::<Author, Sqlite>()
        .insert(pool, &mut author, &Columns::Infer)
        .await
        .unwrap();
    author
}

async fn article(session: &Session, pool: &SqlitePool, author_id: i32, title: &str) -> Article {
    let mut article = Article {
        author_id,
        ..Article::new(title, None)
    };
    session
        .repository::<Article, Sqlite>()
        .insert(pool, &mut article, &Columns::Infer)
        .await
        .unwrap();
    article
}

#[tokio::test]
async fn test_insert_reads_back_defaults() {
    let pool = setup().await;
    let session = Session::default();

    let first = author(&session, &pool, "John").await;
    let second = author(&session, &pool, "Jane").await;
    assert!(first.id > 0);
    assert_eq!(second.id, first.id + 1);

    let article = article(&session, &pool, first.id, "Hello World").await;
    assert!(article.id > 0);
    assert!(article.created_at.is_some());

    let found = session
        .repository::<Article, Sqlite>()
        .find(&pool, article.id)
        .await
        .unwrap();
    assert_eq!(found, article);
}

#[tokio::test]
async fn test_statements_are_cached_per_shape() {
    let pool = setup().await;
    let session = Session::default();

    author(&session, &pool, "John").await;
    let cached = session.cache().len();
    assert_eq!(cached, 1);

    author(&session, &pool, "Jane").await;
    assert_eq!(session.cache().len(), cached);

    let mut explicit = Author {
        id: 100,
        ..Author::new("Joe", "joe@email.com")
    };
    session
        .repository::<Author, Sqlite>()
        .insert(&pool, &mut explicit, &Columns::Infer)
        .await
        .unwrap();
    assert_eq!(session.cache().len(), cached + 1);
}

#[tokio::test]
async fn test_find_missing_row() {
    let pool = setup().await;
    let authors = Session::default().repository::<Author, Sqlite>();

    let err = authors.find(&pool, 404).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { table: "author" }));
    assert!(!authors.exists(&pool, 404).await.unwrap());
}

#[tokio::test]
async fn test_find_columns_leaves_the_rest_default() {
    let pool = setup().await;
    let session = Session::default();
    let john = author(&session, &pool, "John").await;

    let partial = session
        .repository::<Author, Sqlite>()
        .find_columns(&pool, john.id, &["id", "name"])
        .await
        .unwrap();

    assert_eq!(partial.id, john.id);
    assert_eq!(partial.name, "John");
    assert!(partial.email.is_empty());
}

#[tokio::test]
async fn test_update() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();
    let mut john = author(&session, &pool, "John").await;

    john.name = "Johnny".to_string();
    john.email = "johnny@email.com".to_string();
    let affected = authors
        .update(&pool, &mut john, &Columns::whitelist(["name"]))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let found = authors.find(&pool, john.id).await.unwrap();
    assert_eq!(found.name, "Johnny");
    assert_eq!(found.email, "john@email.com");

    authors.reload(&pool, &mut john).await.unwrap();
    assert_eq!(john, found);
}

#[tokio::test]
async fn test_update_with_nothing_to_write() {
    let pool = setup().await;
    let session = Session::default();
    let mut john = author(&session, &pool, "John").await;
    let cached = session.cache().len();

    let err = session
        .repository::<Author, Sqlite>()
        .update(&pool, &mut john, &Columns::whitelist([]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::EmptyColumnSet {
            table: "author",
            operation: Operation::Update,
        }
    ));
    assert_eq!(session.cache().len(), cached);
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();

    let mut john = Author {
        id: 42,
        ..Author::new("John", "john@email.com")
    };

    authors
        .upsert(&pool, &mut john, &UpsertOptions::default())
        .await
        .unwrap();
    authors
        .upsert(&pool, &mut john, &UpsertOptions::default())
        .await
        .unwrap();

    assert_eq!(authors.count(&pool, Author::find()).await.unwrap(), 1);
    assert_eq!(authors.find(&pool, 42).await.unwrap(), john);

    john.name = "Johnny".to_string();
    authors
        .upsert(&pool, &mut john, &UpsertOptions::default())
        .await
        .unwrap();
    assert_eq!(authors.find(&pool, 42).await.unwrap().name, "Johnny");

    let mut ignored = Author {
        id: 42,
        ..Author::new("Nobody", "nobody@email.com")
    };
    authors
        .upsert(&pool, &mut ignored, &UpsertOptions::do_nothing())
        .await
        .unwrap();
    assert_eq!(authors.find(&pool, 42).await.unwrap().name, "Johnny");
    assert_eq!(authors.count(&pool, Author::find()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_eager_load_partitions_children() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();
    let articles = session.repository::<Article, Sqlite>();

    let first = author(&session, &pool, "John").await;
    let second = author(&session, &pool, "Jane").await;
    let third = author(&session, &pool, "Joe").await;

    article(&session, &pool, first.id, "a").await;
    article(&session, &pool, first.id, "b").await;
    article(&session, &pool, third.id, "c").await;

    let mut parents = authors
        .all(
            &pool,
            Author::find()
                .filter(author::columns::Id::is_in([first.id, second.id]))
                .order_by(author::columns::Id::asc()),
        )
        .await
        .unwrap();

    authors
        .load_into(&articles, &pool, &mut parents)
        .await
        .unwrap();

    assert_eq!(parents.len(), 2);
    assert_eq!(
        parents[0]
            .articles
            .iter()
            .map(|e| e.title.as_str())
            .collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert!(parents[1].articles.is_empty());

    let back = parents[0].articles[0].author.as_ref().unwrap();
    assert_eq!(back.id, first.id);
    assert!(back.articles.is_empty());

    let mut none: Vec<Author> = vec![];
    authors.load_into(&articles, &pool, &mut none).await.unwrap();
}

#[tokio::test]
async fn test_load_into_one() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();

    let mut john = author(&session, &pool, "John").await;
    article(&session, &pool, john.id, "a").await;

    authors
        .load_into_one(&session.repository::<Article, Sqlite>(), &pool, &mut john)
        .await
        .unwrap();

    assert_eq!(john.articles.len(), 1);
    assert_eq!(john.articles[0].author.as_ref().unwrap().id, john.id);
}

#[tokio::test]
async fn test_add_existing_children() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();
    let articles = session.repository::<Article, Sqlite>();

    let john = author(&session, &pool, "John").await;
    let mut jane = author(&session, &pool, "Jane").await;
    let moved = article(&session, &pool, john.id, "moved").await;

    {
        let mut connection = pool.acquire().await.unwrap();
        authors
            .add_children(&articles, &mut *connection, &mut jane, false, vec![moved.clone()])
            .await
            .unwrap();
    }

    assert_eq!(jane.articles.len(), 1);
    assert_eq!(jane.articles[0].author_id, jane.id);
    assert_eq!(jane.articles[0].author.as_ref().unwrap().id, jane.id);

    let found = articles.find(&pool, moved.id).await.unwrap();
    assert_eq!(found.author_id, jane.id);
    assert_eq!(found.created_at, moved.created_at);
}

#[tokio::test]
async fn test_hooks() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session
        .repository::<Author, Sqlite>()
        .with_hook(HookPoint::BeforeInsert, |author| {
            author.name = author.name.to_uppercase();
            Ok(())
        })
        .with_hook(HookPoint::BeforeDelete, |_| Err("authors are never deleted".into()));

    let mut john = Author::new("John", "john@email.com");
    authors
        .insert(&pool, &mut john, &Columns::Infer)
        .await
        .unwrap();
    assert_eq!(john.name, "JOHN");
    assert_eq!(authors.find(&pool, john.id).await.unwrap().name, "JOHN");

    let err = authors.delete(&pool, &mut john).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Hook {
            point: HookPoint::BeforeDelete,
            ..
        }
    ));
    assert!(authors.exists(&pool, john.id).await.unwrap());

    let unchecked = Session::new(SessionConfig::new().with_skip_hooks(true))
        .repository::<Author, Sqlite>()
        .with_hook(HookPoint::BeforeDelete, |_| Err("unreachable".into()));
    assert_eq!(unchecked.delete(&pool, &mut john).await.unwrap(), 1);
    assert!(!authors.exists(&pool, john.id).await.unwrap());
}

#[tokio::test]
async fn test_bulk_operations_on_slices() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();

    let mut all = vec![
        author(&session, &pool, "John").await,
        author(&session, &pool, "Jane").await,
        author(&session, &pool, "Joe").await,
    ];

    let affected = authors
        .update_all(&pool, &all[..2], &[author::columns::Name::set("Anonymous".to_string())])
        .await
        .unwrap();
    assert_eq!(affected, 2);
    assert_eq!(all[0].name, "John");

    authors.reload_all(&pool, &mut all).await.unwrap();
    assert_eq!(
        all.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        vec!["Anonymous", "Anonymous", "Joe"]
    );

    let affected = authors.delete_all(&pool, &mut all[1..]).await.unwrap();
    assert_eq!(affected, 2);

    authors.reload_all(&pool, &mut all).await.unwrap();
    assert_eq!(all.len(), 1);

    let err = authors.update_all(&pool, &all, &[]).await.unwrap_err();
    assert!(matches!(err, Error::EmptyColumnSet { .. }));
}

#[tokio::test]
async fn test_query_terminals() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();
    let articles = session
        .repository::<Article, Sqlite>()
        .with_hook(HookPoint::AfterSelect, |article| {
            article.title = article.title.to_uppercase();
            Ok(())
        });

    let john = author(&session, &pool, "John").await;
    let jane = author(&session, &pool, "Jane").await;
    article(&session, &pool, john.id, "a").await;
    article(&session, &pool, john.id, "b").await;
    article(&session, &pool, jane.id, "c").await;

    let by_john = || Article::find().filter(article::columns::AuthorId::eq(john.id));

    assert_eq!(by_john().count(&articles, &pool).await.unwrap(), 2);
    assert!(by_john().exists(&articles, &pool).await.unwrap());

    let last = by_john()
        .order_by(article::columns::Id::desc())
        .one(&articles, &pool)
        .await
        .unwrap();
    assert_eq!(last.title, "B");

    let authors_with_c = Author::find()
        .where_related(article::columns::Title::eq("c".to_string()))
        .all(&authors, &pool)
        .await
        .unwrap();
    assert_eq!(authors_with_c.len(), 1);
    assert_eq!(authors_with_c[0].id, jane.id);

    let of_jane = Article::find()
        .where_parent(author::columns::Name::eq("Jane".to_string()))
        .all(&articles, &pool)
        .await
        .unwrap();
    assert_eq!(of_jane.len(), 1);
    assert_eq!(of_jane[0].title, "C");

    let updated = by_john()
        .update_all(
            &articles,
            &pool,
            &[article::columns::Body::set(Some("edited".to_string()))],
        )
        .await
        .unwrap();
    assert_eq!(updated, 2);
    assert!(
        by_john()
            .all(&articles, &pool)
            .await
            .unwrap()
            .iter()
            .all(|e| e.body.as_deref() == Some("edited"))
    );

    let err = by_john().update_all(&articles, &pool, &[]).await.unwrap_err();
    assert!(matches!(err, Error::EmptyColumnSet { .. }));

    assert_eq!(by_john().delete_all(&articles, &pool).await.unwrap(), 2);
    assert!(!by_john().exists(&articles, &pool).await.unwrap());
    assert_eq!(articles.count(&pool, Article::find()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_load_into_one_replaces_children() {
    let pool = setup().await;
    let session = Session::default();
    let authors = session.repository::<Author, Sqlite>();
    let articles = session.repository::<Article, Sqlite>();

    let mut john = author(&session, &pool, "John").await;
    article(&session, &pool, john.id, "a").await;

    authors
        .load_into_one(&articles, &pool, &mut john)
        .await
        .unwrap();
    authors
        .load_into_one(&articles, &pool, &mut john)
        .await
        .unwrap();

    assert_eq!(john.articles.len(), 1);

    article(&session, &pool, john.id, "b").await;
    authors
        .load_into_one(&articles, &pool, &mut john)
        .await
        .unwrap();

    assert_eq!(
        john.articles
            .iter()
            .map(|e| e.title.as_str())
            .collect::<Vec<_>>(),
        vec!["a", "b"]
    );
}

#[tokio::test]
async fn test_statement_timeout_cancels() {
    let pool = setup().await;
    let authors = Session::new(
        SessionConfig::new().with_statement_timeout(std::time::Duration::from_millis(50)),
    )
    .repository::<Author, Sqlite>();

    let held = pool.acquire().await.unwrap();

    let mut john = Author::new("John", "john@email.com");
    let err = authors
        .insert(&pool, &mut john, &Columns::Infer)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Cancelled {
            table: "author",
            operation: Operation::Insert,
        }
    ));
    assert_eq!(john.id, 0);

    drop(held);

    let count = authors.count(&pool, Author::find()).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_upsert_without_columns_to_insert() {
    let pool = setup().await;
    let session = Session::default();
    let cached = session.cache().len();

    let mut nobody = Author::default();
    let err = session
        .repository::<Author, Sqlite>()
        .upsert(
            &pool,
            &mut nobody,
            &UpsertOptions::default().insert(Columns::blacklist(["email", "name"])),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::EmptyColumnSet {
            table: "author",
            operation: Operation::Upsert,
        }
    ));
    assert_eq!(session.cache().len(), cached);
}
