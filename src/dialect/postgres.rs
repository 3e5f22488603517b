use super::{Db, Dialect};

/// Postgres dialect implementation of the `Dialect` trait.
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn placeholder(idx: usize) -> String {
        format!("${idx}")
    }

    async fn migration(pool: &sqlx::Pool<Db>) -> Result<(), sqlx::Error> {
        let stmts = vec![
            r#"CREATE TABLE IF NOT EXISTS shows (
                id BIGSERIAL PRIMARY KEY,
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
                id BIGSERIAL PRIMARY KEY,
                title VARCHAR(255) NOT NULL UNIQUE
            );"#,
            r#"CREATE TABLE IF NOT EXISTS shows_genres (
                show BIGINT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
                genre BIGINT NOT NULL REFERENCES genres(id) ON DELETE CASCADE,
                PRIMARY KEY (show, genre)
            );"#,
            r#"CREATE TABLE IF NOT EXISTS seasons (
                id BIGSERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                number INTEGER NOT NULL,
                air_date DATE,
                overview TEXT,
                poster VARCHAR(255),
                show BIGINT NOT NULL REFERENCES shows(id) ON DELETE CASCADE
            );"#,
            r#"CREATE TABLE IF NOT EXISTS users_shows (
                "user" BIGINT NOT NULL,
                show BIGINT NOT NULL REFERENCES shows(id) ON DELETE CASCADE,
                status VARCHAR(32),
                rating INTEGER,
                PRIMARY KEY ("user", show)
            );"#,
        ];

        for stmt in stmts {
            sqlx::query(stmt).execute(pool).await?;
        }

        Ok(())
    }
}
