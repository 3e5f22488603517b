//! # SQL Dialect Module
//!
//! This module defines the `Dialect` trait, which abstracts over the differences in
//! SQL syntax across the database systems the catalog can run on. Every statement
//! the catalog issues is produced here, with a placeholder for each user-supplied
//! value; no value is ever formatted into the SQL text itself.
//!
//! The current dialect is chosen at compile time by feature flags. The `sqlite`
//! feature (the default) selects `sqlite::SqliteDialect`; building with
//! `--no-default-features --features postgres` selects `postgres::PostgresDialect`.

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
mod postgres;

/// The current SQL dialect used at compile time, determined by feature flags.
#[cfg(feature = "sqlite")]
pub type CurrentDialect = sqlite::SqliteDialect;

#[cfg(feature = "sqlite")]
pub type Db = sqlx::Sqlite;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type CurrentDialect = postgres::PostgresDialect;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub type Db = sqlx::Postgres;

/// Column list shared by the insert and update statements, in bind order.
const SHOW_COLUMNS: [&str; 9] = [
    "title",
    "first_aired",
    "in_production",
    "tagline",
    "image",
    "description",
    "language",
    "network",
    "webpage",
];

/// A trait for SQL dialects to support database-specific query generation.
///
/// The default method bodies are written in the subset of SQL shared by SQLite
/// and PostgreSQL, so implementors usually only supply [`Dialect::placeholder`]
/// and [`Dialect::migration`].
pub trait Dialect {
    /// Returns the SQL placeholder syntax for the given parameter index.
    ///
    /// - SQLite: `?`
    /// - PostgreSQL: `$1`, `$2`, ...
    ///
    /// # Parameters
    /// - `idx`: The 1-based parameter index (used in dialects that number placeholders).
    fn placeholder(idx: usize) -> String;

    /// Returns one page of shows ordered by ascending id.
    ///
    /// Binds `limit` first, then `offset`.
    fn list_shows_statement() -> String {
        format!(
            "SELECT * FROM shows ORDER BY id ASC LIMIT {} OFFSET {}",
            Self::placeholder(1),
            Self::placeholder(2)
        )
    }

    /// Returns the INSERT for a new show, returning the stored row.
    fn insert_show_statement() -> String {
        let placeholders = (1..=SHOW_COLUMNS.len())
            .map(Self::placeholder)
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO shows ({}) VALUES ({}) RETURNING *",
            SHOW_COLUMNS.join(", "),
            placeholders
        )
    }

    /// Returns the full-row UPDATE keyed by id, returning the updated row.
    ///
    /// The id is bound last, after the nine show columns.
    fn update_show_statement() -> String {
        let assignments = SHOW_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{} = {}", column, Self::placeholder(i + 1)))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "UPDATE shows SET {} WHERE id = {} RETURNING *",
            assignments,
            Self::placeholder(SHOW_COLUMNS.len() + 1)
        )
    }

    /// Returns the SQL statement to fetch a single show by id.
    fn query_show_statement() -> String {
        format!("SELECT * FROM shows WHERE id = {}", Self::placeholder(1))
    }

    /// Returns the titles of all genres attached to a show.
    fn query_genres_statement() -> String {
        format!(
            r#"SELECT genres.title FROM genres
            INNER JOIN shows_genres ON genres.id = shows_genres.genre
            WHERE shows_genres.show = {}
            ORDER BY genres.id ASC"#,
            Self::placeholder(1)
        )
    }

    /// Returns the seasons of a show ordered by season number.
    fn query_seasons_statement() -> String {
        format!(
            "SELECT * FROM seasons WHERE show = {} ORDER BY number ASC",
            Self::placeholder(1)
        )
    }

    /// Returns the watch status and rating of one user for one show.
    ///
    /// Binds the user id first, then the show id.
    fn query_user_show_statement() -> String {
        format!(
            r#"SELECT status, rating FROM users_shows WHERE "user" = {} AND show = {}"#,
            Self::placeholder(1),
            Self::placeholder(2)
        )
    }

    /// Returns the average rating and the number of ratings of a show.
    fn query_rating_summary_statement() -> String {
        format!(
            "SELECT CAST(AVG(rating) AS DOUBLE PRECISION), COUNT(rating) FROM users_shows WHERE show = {}",
            Self::placeholder(1)
        )
    }

    /// Returns the statements deleting rows that reference a show, in execution order.
    fn delete_show_dependents_statements() -> [String; 3] {
        [
            format!("DELETE FROM users_shows WHERE show = {}", Self::placeholder(1)),
            format!("DELETE FROM shows_genres WHERE show = {}", Self::placeholder(1)),
            format!("DELETE FROM seasons WHERE show = {}", Self::placeholder(1)),
        ]
    }

    /// Returns the SQL statement to delete a show by id.
    fn delete_show_statement() -> String {
        format!("DELETE FROM shows WHERE id = {}", Self::placeholder(1))
    }

    /// Creates the catalog tables when they do not exist yet.
    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error>;
}
