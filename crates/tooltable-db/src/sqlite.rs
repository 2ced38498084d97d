//! SQLite implementation of [`ToolStore`].

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use tooltable_core::ReconciliationError;

use crate::error::{DbError, DbResult};
use crate::model::{tool_number, ToolRow, TOOL_TABLE_ID};
use crate::traits::ToolStore;

const CREATE_TOOL_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS tool_table (
        id INTEGER PRIMARY KEY
    )
"#;

const CREATE_TOOL: &str = r#"
    CREATE TABLE IF NOT EXISTS tool (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tool_no INTEGER NOT NULL UNIQUE,
        in_use BOOLEAN NOT NULL DEFAULT 0,
        pocket INTEGER NOT NULL DEFAULT 0,
        x_offset REAL NOT NULL DEFAULT 0,
        y_offset REAL NOT NULL DEFAULT 0,
        z_offset REAL NOT NULL DEFAULT 0,
        a_offset REAL NOT NULL DEFAULT 0,
        b_offset REAL NOT NULL DEFAULT 0,
        c_offset REAL NOT NULL DEFAULT 0,
        u_offset REAL NOT NULL DEFAULT 0,
        v_offset REAL NOT NULL DEFAULT 0,
        w_offset REAL NOT NULL DEFAULT 0,
        i_offset REAL NOT NULL DEFAULT 0,
        j_offset REAL NOT NULL DEFAULT 0,
        q_offset INTEGER NOT NULL DEFAULT 0,
        diameter REAL NOT NULL DEFAULT 0,
        remark TEXT NOT NULL DEFAULT '',
        tool_table_id INTEGER NOT NULL REFERENCES tool_table (id)
    )
"#;

/// Tool store backed by an SQLite database.
pub struct SqliteToolStore {
    pool: SqlitePool,
}

impl SqliteToolStore {
    /// Wrap an existing pool. The schema must already exist; see
    /// [`SqliteToolStore::migrate`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` and set up the schema.
    pub async fn connect(url: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|_| DbError::InvalidUrl(url.to_string()))?
            .create_if_missing(true);

        // in-memory databases live and die with their one connection
        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };
        let pool = pool_options.connect_with(options).await?;

        let store = Self::new(pool);
        store.migrate().await?;
        tracing::info!("Connected to tool store {}", url);
        Ok(store)
    }

    /// Create the tables and the single tool table row if missing
    pub async fn migrate(&self) -> DbResult<()> {
        sqlx::query(CREATE_TOOL_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_TOOL).execute(&self.pool).await?;
        sqlx::query("INSERT OR IGNORE INTO tool_table (id) VALUES (?)")
            .bind(TOOL_TABLE_ID)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ToolStore for SqliteToolStore {
    async fn load_rows(&self) -> DbResult<Vec<ToolRow>> {
        let rows = sqlx::query_as::<_, ToolRow>(
            r#"
            SELECT tool_no, in_use, pocket,
                   x_offset, y_offset, z_offset, a_offset, b_offset, c_offset,
                   u_offset, v_offset, w_offset, i_offset, j_offset, q_offset,
                   diameter, remark, tool_table_id
            FROM tool
            WHERE tool_table_id = ?
            ORDER BY tool_no
            "#,
        )
        .bind(TOOL_TABLE_ID)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert(&self, row: &ToolRow) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO tool (
                tool_no, in_use, pocket,
                x_offset, y_offset, z_offset, a_offset, b_offset, c_offset,
                u_offset, v_offset, w_offset, i_offset, j_offset, q_offset,
                diameter, remark, tool_table_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.tool_no)
        .bind(row.in_use)
        .bind(row.pocket)
        .bind(row.x_offset)
        .bind(row.y_offset)
        .bind(row.z_offset)
        .bind(row.a_offset)
        .bind(row.b_offset)
        .bind(row.c_offset)
        .bind(row.u_offset)
        .bind(row.v_offset)
        .bind(row.w_offset)
        .bind(row.i_offset)
        .bind(row.j_offset)
        .bind(row.q_offset)
        .bind(row.diameter)
        .bind(&row.remark)
        .bind(row.tool_table_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(ReconciliationError::DuplicateInsert {
                    tool_number: tool_number(row.tool_no),
                }
                .into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, row: &ToolRow) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tool SET
                in_use = ?, pocket = ?,
                x_offset = ?, y_offset = ?, z_offset = ?,
                a_offset = ?, b_offset = ?, c_offset = ?,
                u_offset = ?, v_offset = ?, w_offset = ?,
                i_offset = ?, j_offset = ?, q_offset = ?,
                diameter = ?, remark = ?
            WHERE tool_no = ? AND tool_table_id = ?
            "#,
        )
        .bind(row.in_use)
        .bind(row.pocket)
        .bind(row.x_offset)
        .bind(row.y_offset)
        .bind(row.z_offset)
        .bind(row.a_offset)
        .bind(row.b_offset)
        .bind(row.c_offset)
        .bind(row.u_offset)
        .bind(row.v_offset)
        .bind(row.w_offset)
        .bind(row.i_offset)
        .bind(row.j_offset)
        .bind(row.q_offset)
        .bind(row.diameter)
        .bind(&row.remark)
        .bind(row.tool_no)
        .bind(row.tool_table_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ReconciliationError::MissingUpdateTarget {
                tool_number: tool_number(row.tool_no),
            }
            .into());
        }
        Ok(())
    }

    async fn delete(&self, tool_no: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tool WHERE tool_no = ? AND tool_table_id = ?")
            .bind(tool_no)
            .bind(TOOL_TABLE_ID)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ReconciliationError::MissingDeleteTarget {
                tool_number: tool_number(tool_no),
            }
            .into());
        }
        Ok(())
    }
}
