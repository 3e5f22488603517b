use crate::{
    dialect::{CurrentDialect, Dialect},
    model::{DeleteResult, RatingSummary, Season, Show, UserShow},
    schema::ShowRecord,
};
pub use crate::dialect::Db;
pub use sqlx::Pool;
use sqlx::Execute;
use thiserror::Error;

/// Opens a connection pool for `url`.
///
/// SQLite database files are created when missing.
#[cfg(feature = "sqlite")]
pub async fn connect(url: &str, max_connections: u32) -> Result<Pool<Db>, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    if let Some(dir) = options
        .get_filename()
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        std::fs::create_dir_all(dir)?;
    }

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Opens a connection pool for `url`.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub async fn connect(url: &str, max_connections: u32) -> Result<Pool<Db>, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
}

pub async fn run_migration(pool: &Pool<Db>) -> Result<(), sqlx::Error> {
    CurrentDialect::migration(pool).await
}

/// A database abstraction over the show catalog tables.
///
/// This struct wraps an SQLx connection pool. Every statement comes from
/// [`Dialect`] and every value is bound as a parameter.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Db>,
}

impl Database {
    pub async fn with_migration(pool: Pool<Db>) -> Result<Self, sqlx::Error> {
        run_migration(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Db> {
        &self.pool
    }

    /// Runs `op` again when it fails with a transient error.
    ///
    /// Only idempotent statements go through here.
    async fn retry<F, Fut, T>(&self, mut op: F) -> Result<T, DatabaseError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, DatabaseError>>,
    {
        let max_retries = 3;
        for attempt in 0..max_retries {
            let result = op().await;
            match result {
                Ok(v) => return Ok(v),
                Err(ref e) if e.is_retryable() && attempt + 1 < max_retries => {
                    tracing::warn!(error = %e, attempt, "retrying database statement");
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("Retry loop should return before exceeding max_retries")
    }

    /// Returns up to `limit` shows after skipping `offset`, ordered by id.
    pub async fn list_shows(&self, offset: i64, limit: i64) -> Result<Vec<Show>, DatabaseError> {
        let stmt = CurrentDialect::list_shows_statement();

        self.retry(|| async {
            sqlx::query_as::<_, Show>(&stmt)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::ListShows { offset, limit },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await
    }

    /// Inserts a show and returns the stored row.
    ///
    /// Not retried: a lost acknowledgement would otherwise insert twice.
    pub async fn insert_show(&self, record: &ShowRecord) -> Result<Show, DatabaseError> {
        let stmt = CurrentDialect::insert_show_statement();

        let query = sqlx::query_as::<_, Show>(&stmt)
            .bind(&record.title)
            .bind(record.first_aired)
            .bind(record.in_production)
            .bind(&record.tagline)
            .bind(&record.image)
            .bind(&record.description)
            .bind(&record.language)
            .bind(&record.network)
            .bind(&record.webpage);
        let sql = query.sql().to_string();

        query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::QueryFailed {
                operation: DbOperation::InsertShow {
                    title: record.title.clone(),
                },
                sql,
                source: e,
            })
    }

    /// Overwrites every column of the show with `id`.
    ///
    /// Returns `None` when no show has that id; nothing is changed then.
    pub async fn update_show(
        &self,
        id: i64,
        record: &ShowRecord,
    ) -> Result<Option<Show>, DatabaseError> {
        let stmt = CurrentDialect::update_show_statement();

        self.retry(|| async {
            sqlx::query_as::<_, Show>(&stmt)
                .bind(&record.title)
                .bind(record.first_aired)
                .bind(record.in_production)
                .bind(&record.tagline)
                .bind(&record.image)
                .bind(&record.description)
                .bind(&record.language)
                .bind(&record.network)
                .bind(&record.webpage)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::UpdateShow { id },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await
    }

    pub async fn get_show(&self, id: i64) -> Result<Option<Show>, DatabaseError> {
        let stmt = CurrentDialect::query_show_statement();

        self.retry(|| async {
            sqlx::query_as::<_, Show>(&stmt)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::QueryShow { id },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await
    }

    /// Returns the genre titles of a show. Empty when it has none.
    pub async fn get_genres(&self, show: i64) -> Result<Vec<String>, DatabaseError> {
        let stmt = CurrentDialect::query_genres_statement();

        self.retry(|| async {
            sqlx::query_scalar::<_, String>(&stmt)
                .bind(show)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::QueryGenres { show },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await
    }

    pub async fn get_seasons(&self, show: i64) -> Result<Vec<Season>, DatabaseError> {
        let stmt = CurrentDialect::query_seasons_statement();

        self.retry(|| async {
            sqlx::query_as::<_, Season>(&stmt)
                .bind(show)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::QuerySeasons { show },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await
    }

    pub async fn get_user_show(
        &self,
        user: i64,
        show: i64,
    ) -> Result<Option<UserShow>, DatabaseError> {
        let stmt = CurrentDialect::query_user_show_statement();

        self.retry(|| async {
            sqlx::query_as::<_, UserShow>(&stmt)
                .bind(user)
                .bind(show)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::QueryUserShow { user, show },
                    sql: stmt.clone(),
                    source: e,
                })
        })
        .await
    }

    pub async fn get_rating_summary(&self, show: i64) -> Result<RatingSummary, DatabaseError> {
        let stmt = CurrentDialect::query_rating_summary_statement();

        let (rating, rating_count) = self
            .retry(|| async {
                sqlx::query_as::<_, (Option<f64>, i64)>(&stmt)
                    .bind(show)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::QueryRatings { show },
                        sql: stmt.clone(),
                        source: e,
                    })
            })
            .await?;

        Ok(RatingSummary {
            rating,
            rating_count,
        })
    }

    /// Removes a show together with the rows referencing it.
    ///
    /// This is a transactional operation that:
    /// 1. Deletes the show's `users_shows`, `shows_genres` and `seasons` rows
    /// 2. Deletes the show row itself
    ///
    /// If any step fails, the entire transaction is rolled back. The returned
    /// count only covers the show row.
    pub async fn delete_show(&self, id: i64) -> Result<DeleteResult, DatabaseError> {
        let dependents = CurrentDialect::delete_show_dependents_statements();
        let stmt = CurrentDialect::delete_show_statement();

        self.retry(|| async {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| DatabaseError::TransactionFailed { source: e })?;

            for sql in &dependents {
                sqlx::query(sql)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| DatabaseError::QueryFailed {
                        operation: DbOperation::DeleteShow { id },
                        sql: sql.clone(),
                        source: e,
                    })?;
            }

            let result = sqlx::query(&stmt)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| DatabaseError::QueryFailed {
                    operation: DbOperation::DeleteShow { id },
                    sql: stmt.clone(),
                    source: e,
                })?;

            tx.commit()
                .await
                .map_err(|e| DatabaseError::TransactionFailed { source: e })?;

            Ok::<_, DatabaseError>(DeleteResult {
                rows_affected: result.rows_affected(),
            })
        })
        .await
    }
}

/// Represents errors that can occur during database operations.
///
/// Each variant includes contextual information to assist with debugging and error handling.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A general SQL query failure, with the operation and the SQL text.
    #[error("Query failed during {operation:?}: sql={sql}")]
    QueryFailed {
        operation: DbOperation,
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    /// A failure to begin or commit a transaction.
    #[error("Failed to operate transaction")]
    TransactionFailed {
        #[source]
        source: sqlx::Error,
    },
}

/// Enum representing the kind of database operation being performed,
/// used for attaching context to [`DatabaseError::QueryFailed`].
#[derive(Debug)]
pub enum DbOperation {
    /// SELECT * FROM shows ORDER BY id LIMIT .. OFFSET ..
    ListShows { offset: i64, limit: i64 },
    /// INSERT INTO shows
    InsertShow { title: String },
    /// UPDATE shows SET .. WHERE id = ..
    UpdateShow { id: i64 },
    /// SELECT * FROM shows WHERE id = ..
    QueryShow { id: i64 },
    QueryGenres { show: i64 },
    QuerySeasons { show: i64 },
    QueryUserShow { user: i64, show: i64 },
    QueryRatings { show: i64 },
    /// DELETE FROM shows (and its dependents)
    DeleteShow { id: i64 },
}

impl DatabaseError {
    fn is_retryable(&self) -> bool {
        let is_retryable_kind = |e: &sqlx::Error| {
            matches!(e, sqlx::Error::Io(_))
                || matches!(e, sqlx::Error::Protocol(_))
                || matches!(e, sqlx::Error::PoolTimedOut)
        };

        match self {
            DatabaseError::QueryFailed { source, .. } => is_retryable_kind(source),
            DatabaseError::TransactionFailed { source } => is_retryable_kind(source),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::{
        database::{Database, Db, Pool, connect},
        schema::{Operation, ShowInput, ShowRecord, validate},
    };

    /// Returns a migrated database on a single-connection in-memory SQLite pool.
    pub(crate) async fn get_db() -> Database {
        let pool: Pool<Db> = connect("sqlite::memory:", 1).await.unwrap();
        Database::with_migration(pool).await.unwrap()
    }

    pub(crate) fn record(title: &str) -> ShowRecord {
        let input = ShowInput {
            title: Some(title.to_string()),
            language: Some("en".to_string()),
            ..Default::default()
        };
        validate(Operation::Create, &input).unwrap().sanitize().unwrap()
    }

    pub(crate) async fn seed_details(db: &Database, show: i64) {
        for stmt in [
            "INSERT INTO genres (title) VALUES ('Drama'), ('Crime')",
            "INSERT INTO shows_genres (show, genre) SELECT ?, id FROM genres",
            "INSERT INTO seasons (name, number, show) VALUES ('Season 2', 2, ?), ('Season 1', 1, ?)",
            r#"INSERT INTO users_shows ("user", show, status, rating) VALUES (1, ?, 'watching', 4), (2, ?, 'watched', 5)"#,
        ] {
            let binds = stmt.matches('?').count();
            let mut query = sqlx::query(stmt);
            for _ in 0..binds {
                query = query.bind(show);
            }
            query.execute(db.pool()).await.unwrap();
        }
    }

    /// Verifies that `Database::with_migration` can be called multiple times
    /// on the same pool without error.
    #[tokio::test]
    async fn test_migration_idempotency() {
        let pool: Pool<Db> = connect("sqlite::memory:", 1).await.unwrap();

        Database::with_migration(pool.clone()).await.unwrap();
        Database::with_migration(pool.clone()).await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_get_show() {
        let db = get_db().await;

        let show = db.insert_show(&record("Dark")).await.unwrap();

        assert_eq!("Dark", show.title);
        assert_eq!(Some("en".to_string()), show.language);
        assert_eq!(None, show.tagline);
        assert_eq!(Some(show.clone()), db.get_show(show.id).await.unwrap());
        assert_eq!(None, db.get_show(show.id + 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_shows_pages_by_id() {
        let db = get_db().await;
        for title in ["a", "b", "c", "d", "e"] {
            db.insert_show(&record(title)).await.unwrap();
        }

        let page = db.list_shows(1, 2).await.unwrap();
        let titles: Vec<&str> = page.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(vec!["b", "c"], titles);

        assert_eq!(1, db.list_shows(4, 10).await.unwrap().len());
        assert!(db.list_shows(10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_show() {
        let db = get_db().await;
        let show = db.insert_show(&record("Dark")).await.unwrap();

        let updated = db.update_show(show.id, &record("Dark (2017)")).await.unwrap();
        assert_eq!(Some("Dark (2017)".to_string()), updated.map(|s| s.title));

        assert_eq!(None, db.update_show(show.id + 100, &record("x")).await.unwrap());
        assert_eq!(1, db.list_shows(0, 10).await.unwrap().len());
    }

    #[tokio::test]
    async fn test_details() {
        let db = get_db().await;
        let show = db.insert_show(&record("The Wire")).await.unwrap();
        seed_details(&db, show.id).await;

        assert_eq!(
            vec!["Drama".to_string(), "Crime".to_string()],
            db.get_genres(show.id).await.unwrap()
        );

        let seasons = db.get_seasons(show.id).await.unwrap();
        assert_eq!(vec![1, 2], seasons.iter().map(|s| s.number).collect::<Vec<_>>());

        let user = db.get_user_show(1, show.id).await.unwrap().unwrap();
        assert_eq!(Some("watching".to_string()), user.status);
        assert_eq!(Some(4), user.rating);
        assert_eq!(None, db.get_user_show(3, show.id).await.unwrap());

        let ratings = db.get_rating_summary(show.id).await.unwrap();
        assert_eq!(Some(4.5), ratings.rating);
        assert_eq!(2, ratings.rating_count);
    }

    #[tokio::test]
    async fn test_rating_summary_without_ratings() {
        let db = get_db().await;
        let show = db.insert_show(&record("New")).await.unwrap();

        let ratings = db.get_rating_summary(show.id).await.unwrap();
        assert_eq!(None, ratings.rating);
        assert_eq!(0, ratings.rating_count);
    }

    #[tokio::test]
    async fn test_delete_show_removes_dependents() {
        let db = get_db().await;
        let show = db.insert_show(&record("The Wire")).await.unwrap();
        seed_details(&db, show.id).await;

        assert_eq!(1, db.delete_show(show.id).await.unwrap().rows_affected);
        assert_eq!(None, db.get_show(show.id).await.unwrap());
        assert!(db.get_seasons(show.id).await.unwrap().is_empty());
        assert!(db.get_genres(show.id).await.unwrap().is_empty());

        assert_eq!(0, db.delete_show(show.id).await.unwrap().rows_affected);
    }
}
