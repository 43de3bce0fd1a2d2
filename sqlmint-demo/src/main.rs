use std::io::Write;

use clap::{Parser, Subcommand};
use eyre::{Context, eyre};
use sqlmint::{
    Session, SessionConfig,
    dialect::Dialect,
    query::parse::ParseFromRow,
};
use sqlmint_demo::{
    app::{App, AuthorArticle, Strategy, render_json, render_text},
    db::{DbType, connect_postgres, connect_sqlite, get_database_url},
    schema,
};
use sqlx::{Database, Executor, Pool};
use tracing::{error, level_filters::LevelFilter};
use tracing_subscriber::{
    fmt::{format, layer},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Connection string of the database. Falls back to `DATABASE_URL`.
    #[arg(short, long, value_name = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Log every statement that is executed.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Abort statements that take longer than this many milliseconds.
    #[arg(long, value_name = "MILLIS", global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an author with two articles and print them back.
    Run {
        #[arg(short, long, value_enum, default_value_t)]
        strategy: Strategy,
    },
    /// Print an existing author with its articles.
    Show {
        #[arg(short, long)]
        author_id: i32,

        #[arg(short, long, value_enum, default_value_t)]
        strategy: Strategy,

        #[arg(long)]
        json: bool,
    },
}

async fn execute<DB>(pool: Pool<DB>, db_type: DbType, cli: &Cli) -> eyre::Result<()>
where
    DB: Dialect,
    for<'e> &'e mut <DB as Database>::Connection: Executor<'e, Database = DB>,
    AuthorArticle: ParseFromRow<DB>,
{
    schema::bootstrap(&pool, db_type)
        .await
        .wrap_err("Failed to create tables")?;

    let mut config = SessionConfig::new();
    if let Some(timeout) = cli.timeout {
        config = config.with_statement_timeout(std::time::Duration::from_millis(timeout));
    }

    let app = App::new(pool, &Session::new(config));
    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Commands::Run { strategy } => app.run(*strategy, &mut stdout).await?,
        Commands::Show {
            author_id,
            strategy,
            json,
        } => {
            let author = app
                .author_with_articles(*author_id, *strategy)
                .await
                .wrap_err_with(|| format!("Failed to fetch author {author_id}"))?;

            if *json {
                render_json(&author, &mut stdout)?;
            } else {
                render_text(&author, &mut stdout)?;
            }
        }
    }

    stdout.flush()?;

    Ok(())
}

async fn run(cli: Cli) -> eyre::Result<()> {
    let Some(database_url) = cli.database_url.clone().or_else(get_database_url) else {
        return Err(eyre!(
            "No database URL given. Pass --database-url or set DATABASE_URL."
        ));
    };

    match DbType::from_connection_string(&database_url) {
        Some(DbType::Postgres) => {
            let pool = connect_postgres(&database_url).await?;
            execute(pool, DbType::Postgres, &cli).await
        }
        Some(DbType::Sqlite) => {
            let pool = connect_sqlite(&database_url).await?;
            execute(pool, DbType::Sqlite, &cli).await
        }
        None => Err(eyre!("Unsupported database: {database_url}")),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(level)
        .with(
            layer().event_format(
                format()
                    .without_time()
                    .with_target(false)
                    .compact(),
            ),
        )
        .init();

    if let Err(e) = run(cli).await {
        error!("Command execution failed: {e:#}");
        std::process::exit(1);
    }
}
