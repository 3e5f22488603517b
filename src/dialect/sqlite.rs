use super::{Db, Dialect};

/// SQLite dialect implementation of the `Dialect` trait.
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn placeholder(_idx: usize) -> String {
        "?".to_string()
    }

    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error> {
        let stmts = vec![
            r#"CREATE TABLE IF NOT EXISTS shows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                first_aired DATE,
                in_production BOOLEAN,
                tagline VARCHAR(255),
                image VARCHAR(255),
                description TEXT,
                language VARCHAR(2),
                network VARCHAR(255),
                webpage VARCHAR(255)
            );"#,
            r#"CREATE TABLE IF NOT EXISTS genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL UNIQUE
            );"#,
            r#"CREATE TABLE IF NOT EXISTS shows_genres (
                show INTEGER NOT NULL,
                genre INTEGER NOT NULL,
                PRIMARY KEY (show, genre),
                FOREIGN KEY (show) REFERENCES shows(id) ON DELETE CASCADE,
                FOREIGN KEY (genre) REFERENCES genres(id) ON DELETE CASCADE
            );"#,
            r#"CREATE TABLE IF NOT EXISTS seasons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                number INTEGER NOT NULL,
                air_date DATE,
                overview TEXT,
                poster VARCHAR(255),
                show INTEGER NOT NULL,
                FOREIGN KEY (show) REFERENCES shows(id) ON DELETE CASCADE
            );"#,
            r#"CREATE TABLE IF NOT EXISTS users_shows (
                "user" INTEGER NOT NULL,
                show INTEGER NOT NULL,
                status VARCHAR(32),
                rating INTEGER,
                PRIMARY KEY ("user", show),
                FOREIGN KEY (show) REFERENCES shows(id) ON DELETE CASCADE
            );"#,
        ];

        for stmt in stmts {
            sqlx::query(stmt).execute(pool).await?;
        }

        Ok(())
    }
}
