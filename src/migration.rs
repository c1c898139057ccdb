//! Database bootstrap: create the target database and the `books` table if they are missing.

use crate::error::AppError;
use crate::store::BOOKS_TABLE;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Create the books table, its check constraints, and the title search index. Idempotent.
pub async fn ensure_books_table(pool: &PgPool) -> Result<(), AppError> {
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id BIGSERIAL PRIMARY KEY,
            created_at TIMESTAMP(0) WITH TIME ZONE NOT NULL DEFAULT NOW(),
            title TEXT NOT NULL,
            year INTEGER NOT NULL,
            pages INTEGER NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        )
        "#,
        table = BOOKS_TABLE
    );
    sqlx::query(&ddl).execute(pool).await?;

    let constraints = [
        ("books_pages_check", "CHECK (pages >= 0)"),
        ("books_year_check", "CHECK (year BETWEEN 1888 AND date_part('year', now()))"),
        ("books_title_length_check", "CHECK (octet_length(title) <= 500)"),
    ];
    for (name, check) in constraints {
        // ADD CONSTRAINT has no IF NOT EXISTS.
        let sql = format!("ALTER TABLE {} ADD CONSTRAINT {} {}", BOOKS_TABLE, name, check);
        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => tracing::debug!(constraint = name, "constraint added"),
            Err(e) if is_duplicate_object(&e) => {
                tracing::debug!(constraint = name, "constraint already present")
            }
            Err(e) => return Err(e.into()),
        }
    }

    let index = format!(
        "CREATE INDEX IF NOT EXISTS books_title_idx ON {} USING GIN (to_tsvector('simple', title))",
        BOOKS_TABLE
    );
    sqlx::query(&index).execute(pool).await?;
    tracing::info!(table = BOOKS_TABLE, "books table ready");
    Ok(())
}

/// SQLSTATE 42710: the object (here, a named constraint) already exists.
fn is_duplicate_object(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some("42710"))
}

/// Create the bookshelf database named in `database_url` when the server is
/// pointed at a fresh Postgres. Runs before the pool exists, over a single
/// maintenance connection to the `postgres` database.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = split_database_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::Internal(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

/// Split `postgres://host/db?opts` into the maintenance URL (`.../postgres`) and `db`.
fn split_database_url(url: &str) -> Result<(String, String), AppError> {
    let without_query = url.split_once('?').map_or(url, |(base, _)| base);
    let (server, db_name) = without_query
        .rsplit_once('/')
        .ok_or_else(|| AppError::Internal("DATABASE_URL has no database path".into()))?;
    Ok((format!("{}/postgres", server), db_name.trim().to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
