use sqlmint::Session;
use sqlmint_demo::{
    app::{App, Strategy},
    db::{DbType, connect_sqlite},
    schema,
};

async fn app() -> App<sqlx::Sqlite> {
    let pool = connect_sqlite("sqlite::memory:").await.unwrap();
    schema::bootstrap(&pool, DbType::Sqlite).await.unwrap();
    App::new(pool, &Session::default())
}

#[tokio::test]
async fn test_run_prints_author_and_articles() {
    let app = app().await;

    let mut out: Vec<u8> = vec![];
    app.run(Strategy::Eager, &mut out).await.unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.starts_with("Author: \n\tID:1 \n\tName:John Doe \n\tEmail:johndoe@email.com\n"));
    assert_eq!(out.matches("Article: ").count(), 2);
    assert_eq!(out.matches("Body:Hello world, this is an article.").count(), 2);
}

#[tokio::test]
async fn test_strategies_agree() {
    let app = app().await;
    app.run(Strategy::Lazy, &mut Vec::<u8>::new()).await.unwrap();
    let empty = app.create_author("Jane", "jane@email.com").await.unwrap();

    let mut loaded = vec![];
    for strategy in [Strategy::Lazy, Strategy::Eager, Strategy::Join] {
        let author = app.author_with_articles(1, strategy).await.unwrap();

        assert_eq!(author.name, "John Doe");
        loaded.push(
            author
                .articles
                .into_iter()
                .map(|e| (e.id, e.title, e.body, e.author_id, e.created_at))
                .collect::<Vec<_>>(),
        );

        let author = app
            .author_with_articles(empty.id, strategy)
            .await
            .unwrap();
        assert!(author.articles.is_empty());

        let err = app.author_with_articles(404, strategy).await.unwrap_err();
        assert!(err.is_not_found());
    }

    assert_eq!(loaded[0].len(), 2);
    assert_eq!(loaded[0], loaded[1]);
    assert_eq!(loaded[0], loaded[2]);
}
