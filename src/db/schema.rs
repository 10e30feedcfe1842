use sqlx::SqlitePool;

pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
pub const SCHEMA_VERSION: &str = "1";

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let version = match sqlx::query_scalar::<_, String>(
        r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#,
    )
    .fetch_optional(pool)
    .await
    {
        Ok(version) => version,
        Err(sqlx::Error::Database(err)) if is_missing_table(err.message()) => None,
        Err(err) => return Err(err),
    };

    if version.as_deref() == Some(SCHEMA_VERSION) {
        tracing::debug!(version = SCHEMA_VERSION, "schema up to date");
        return Ok(());
    }

    tracing::info!(version = SCHEMA_VERSION, "applying schema");

    let mut tx = pool.begin().await?;
    for stmt in split_sql_statements(SCHEMA_SQL) {
        let sql: String = stmt
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            continue;
        }
        sqlx::query(trimmed).execute(&mut *tx).await?;
    }

    sqlx::query(r#"INSERT OR REPLACE INTO "_db_metadata" ("key", "value") VALUES ('schema_version', ?)"#)
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// First start: the metadata table itself does not exist yet.
fn is_missing_table(message: &str) -> bool {
    message.contains("no such table")
}

pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut prev = '\0';

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote && prev != '\\' => {
                in_single_quote = !in_single_quote;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
            }
            ';' if !in_single_quote && !in_double_quote => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
                prev = ch;
                continue;
            }
            _ => {}
        }

        current.push(ch);
        prev = ch;
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_database_is_migrated_once() {
        let pool = memory_pool().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let version: String =
            sqlx::query_scalar(r#"SELECT "value" FROM "_db_metadata" WHERE "key" = 'schema_version'"#)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn unreadable_metadata_is_an_error() {
        let pool = memory_pool().await;
        sqlx::query(r#"CREATE TABLE "_db_metadata" ("key" TEXT PRIMARY KEY)"#)
            .execute(&pool)
            .await
            .unwrap();

        assert!(run_migrations(&pool).await.is_err());
    }

    #[test]
    fn only_missing_tables_count_as_first_start() {
        assert!(is_missing_table("no such table: _db_metadata"));
        assert!(!is_missing_table("database is locked"));
    }

    #[test]
    fn split_keeps_quoted_semicolons() {
        let sql = "CREATE TABLE a (x TEXT DEFAULT ';');\nINSERT INTO \"b;c\" VALUES (1);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("';'"));
        assert!(statements[1].starts_with("INSERT"));
    }

    #[test]
    fn embedded_schema_declares_every_table() {
        let statements = split_sql_statements(SCHEMA_SQL);
        for table in [
            "users",
            "exercises",
            "words",
            "word_reviews",
            "user_submissions",
            "user_rankings",
        ] {
            let needle = format!("CREATE TABLE IF NOT EXISTS \"{table}\"");
            assert!(
                statements.iter().any(|s| s.contains(&needle)),
                "missing table {table}"
            );
        }
    }
}
