use crate::config::DatabaseConfig;
use crate::constants::DEFAULT_QUERY_TIMEOUT;
use crate::domain::{Options, PaginatedResponse, Risk, State};
use crate::error::{Result, RiskError};
use crate::storage::RiskStore;
use async_trait::async_trait;
use libsql::params::IntoParams;
use libsql::{Builder, Connection, Database, Row};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

const CREATE_RISKS_TABLE: &str = include_str!("../migrations/001_create_risks.sql");

const INSERT_RISK: &str =
    "INSERT INTO risks (id, title, description, state) VALUES (?1, ?2, ?3, ?4)";
const GET_RISK_BY_ID: &str = "SELECT id, title, description, state FROM risks WHERE id = ?1";
const COUNT_ALL_RISKS: &str = "SELECT COUNT(*) FROM risks";
const DELETE_RISK_BY_ID: &str = "DELETE FROM risks WHERE id = ?1";

fn db_error(context: &str, e: impl std::fmt::Display) -> RiskError {
    RiskError::Database {
        message: format!("{context}: {e}"),
    }
}

fn is_remote(url: &str) -> bool {
    ["libsql://", "http://", "https://"]
        .iter()
        .any(|scheme| url.starts_with(scheme))
}

/// Page query. Only allow-listed column and direction names reach the text;
/// limit and offset stay bound parameters.
fn select_page_sql(options: &Options) -> String {
    format!(
        "SELECT id, title, description, state FROM risks ORDER BY {} {}, id ASC LIMIT ?1 OFFSET ?2",
        options.sort_by.as_sql(),
        options.sort_order.as_sql()
    )
}

fn risk_from_row(row: &Row) -> Result<Risk> {
    let id: String = row.get(0).map_err(|e| db_error("Failed to get id", e))?;
    let title: String = row.get(1).map_err(|e| db_error("Failed to get title", e))?;
    let description: String = row
        .get(2)
        .map_err(|e| db_error("Failed to get description", e))?;
    let state: String = row.get(3).map_err(|e| db_error("Failed to get state", e))?;

    Ok(Risk {
        id: Uuid::parse_str(&id).map_err(|e| db_error("Failed to decode id", e))?,
        state: state
            .parse::<State>()
            .map_err(|e| db_error("Failed to decode state", e))?,
        title,
        description,
    })
}

/// libSQL-backed risk store. One connection is shared by every request.
pub struct DatabaseManager {
    // Keeps the database handle alive for as long as the connection is in use.
    _db: Database,
    conn: Connection,
    query_timeout: Duration,
}

impl DatabaseManager {
    /// Open a local file (or `:memory:`) or connect to a remote libSQL/Turso database.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let db = if is_remote(&config.url) {
            let auth_token = config.auth_token.clone().ok_or_else(|| RiskError::Database {
                message: "LIBSQL_AUTH_TOKEN must be set for a remote database".to_string(),
            })?;
            info!("Connecting to remote database at {}", config.url);
            Builder::new_remote(config.url.clone(), auth_token)
                .build()
                .await
        } else {
            info!("Opening local database at {}", config.url);
            Builder::new_local(&config.url).build().await
        }
        .map_err(|e| db_error("Failed to connect to database", e))?;

        Self::from_database(db, config.query_timeout())
    }

    /// Private in-memory database, used by tests and throwaway runs.
    pub async fn in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| db_error("Failed to open in-memory database", e))?;

        Self::from_database(db, DEFAULT_QUERY_TIMEOUT)
    }

    fn from_database(db: Database, query_timeout: Duration) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| db_error("Failed to get database connection", e))?;

        Ok(Self {
            _db: db,
            conn,
            query_timeout,
        })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        self.bounded("Failed to run migrations", async {
            self.conn
                .execute_batch(CREATE_RISKS_TABLE)
                .await
                .map(|_| ())
                .map_err(|e| db_error("Failed to run migrations", e))
        })
        .await?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Release the connection. Fails when request handlers still hold the store.
    pub fn close(self: Arc<Self>) -> Result<()> {
        match Arc::try_unwrap(self) {
            Ok(manager) => {
                drop(manager);
                info!("Closed database connection");
                Ok(())
            }
            Err(_) => Err(RiskError::Database {
                message: "connection is still held by in-flight requests".to_string(),
            }),
        }
    }

    /// Run one store round-trip under the query timeout.
    ///
    /// Local statements execute inside the first poll, so in practice the
    /// deadline only cuts short remote round-trips.
    async fn bounded<T, F>(&self, context: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| RiskError::Database {
                message: format!("{context}: timed out after {:?}", self.query_timeout),
            })?
    }

    /// Run a query and decode every row with `decode`.
    ///
    /// A local row only reads from the statement's current step, so each one
    /// is decoded before the cursor moves on.
    async fn fetch_rows<T, D>(
        &self,
        context: &str,
        sql: &str,
        params: impl IntoParams + Send,
        decode: D,
    ) -> Result<Vec<T>>
    where
        T: Send,
        D: Fn(&Row) -> Result<T> + Send,
    {
        self.bounded(context, async {
            let mut rows = self
                .conn
                .query(sql, params)
                .await
                .map_err(|e| db_error(context, e))?;

            let mut decoded = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| db_error(context, e))? {
                decoded.push(decode(&row)?);
            }
            Ok(decoded)
        })
        .await
    }
}

#[async_trait]
impl RiskStore for DatabaseManager {
    async fn add(&self, risk: &Risk) -> Result<()> {
        self.bounded("Failed to insert risk", async {
            self.conn
                .execute(
                    INSERT_RISK,
                    libsql::params![
                        risk.id.to_string(),
                        risk.title.as_str(),
                        risk.description.as_str(),
                        risk.state.as_str()
                    ],
                )
                .await
                .map_err(|e| db_error("Failed to insert risk", e))
        })
        .await?;

        debug!("Inserted risk {}", risk.id);
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Risk>> {
        let mut risks = self
            .fetch_rows(
                "Failed to query risk",
                GET_RISK_BY_ID,
                libsql::params![id.to_string()],
                risk_from_row,
            )
            .await?;

        Ok(risks.pop())
    }

    async fn get_all(&self, options: &Options) -> Result<PaginatedResponse> {
        let counts = self
            .fetch_rows(
                "Failed to count risks",
                COUNT_ALL_RISKS,
                libsql::params![],
                |row| row.get::<i64>(0).map_err(|e| db_error("Failed to get count", e)),
            )
            .await?;
        let total_count = counts.first().copied().unwrap_or(0);

        let risks = self
            .fetch_rows(
                "Failed to list risks",
                &select_page_sql(options),
                libsql::params![options.limit, options.offset],
                risk_from_row,
            )
            .await?;

        debug!(
            "Listed {} of {} risks (offset {}, limit {})",
            risks.len(),
            total_count,
            options.offset,
            options.limit
        );
        Ok(PaginatedResponse { total_count, risks })
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        let affected = self
            .bounded("Failed to delete risk", async {
                self.conn
                    .execute(DELETE_RISK_BY_ID, libsql::params![id.to_string()])
                    .await
                    .map_err(|e| db_error("Failed to delete risk", e))
            })
            .await?;

        debug!("Deleted risk {} ({} rows)", id, affected);
        Ok(())
    }
}
