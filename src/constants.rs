//! Defaults shared by the HTTP layer, the service and the store.

use std::time::Duration;

// Pagination
pub const DEFAULT_LIMIT: i64 = 10;
pub const DEFAULT_OFFSET: i64 = 0;

// Query parameter names on GET /v1/risks
pub const OFFSET_PARAM: &str = "offset";
pub const LIMIT_PARAM: &str = "limit";
pub const SORT_BY_PARAM: &str = "sortBy";
pub const SORT_ORDER_PARAM: &str = "sortOrder";

/// Response header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Body returned by the liveness probe
pub const HEALTH_RESPONSE: &str = "pong";

// Server and store defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(25);
pub const DEFAULT_DATABASE_URL: &str = "risks.db";
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

// Environment variables read by the config loader
pub const ENV_HOST: &str = "RISKS_HOST";
pub const ENV_PORT: &str = "RISKS_PORT";
pub const ENV_SHUTDOWN_TIMEOUT_SECS: &str = "RISKS_SHUTDOWN_TIMEOUT_SECS";
pub const ENV_DATABASE_URL: &str = "RISKS_DATABASE_URL";
pub const ENV_AUTH_TOKEN: &str = "LIBSQL_AUTH_TOKEN";
pub const ENV_QUERY_TIMEOUT_SECS: &str = "RISKS_QUERY_TIMEOUT_SECS";
