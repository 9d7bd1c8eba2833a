use uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Target SQL dialect for a validation request.
///
/// Only PostgreSQL is currently supported; any other value is rejected at
/// the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Postgres,
}

/// Error returned when parsing an unknown dialect name.
#[derive(Debug, thiserror::Error)]
#[error("unsupported database dialect '{0}' (supported: postgres)")]
pub struct UnsupportedDialect(pub String);

impl std::str::FromStr for Dialect {
    type Err = UnsupportedDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(UnsupportedDialect(other.to_string())),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => f.write_str("postgres"),
        }
    }
}

/// Which side of a comparison a shadow run belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Original,
    Candidate,
}

impl Variant {
    /// Short label for logging.
    pub fn label(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Candidate => "candidate",
        }
    }
}

/// One SQL optimization validation job. Immutable after creation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OptimizationRequest {
    /// Unique request identifier (UUID v4).
    pub id: Uuid,
    /// The original SQL statement submitted by the caller.
    pub sql: String,
    /// Target dialect of the shadow environment.
    pub dialect: Dialect,
    /// Submission time.
    pub created_at: Timestamp,
}

impl OptimizationRequest {
    /// Create a new request with a fresh id and the current timestamp.
    pub fn new(sql: impl Into<String>, dialect: Dialect) -> Self {
        Self {
            id: Uuid::new_v4(),
            sql: sql.into(),
            dialect,
            created_at: chrono::Utc::now(),
        }
    }
}
