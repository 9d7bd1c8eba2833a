//! Engine configuration.
//!
//! All thresholds that govern the verification loop live here and are passed
//! explicitly into the orchestrator's constructor, never read from ambient
//! process state, so validation runs stay reproducible in tests.

/// Operations the security guard refuses to execute in the shadow
/// environment. `CREATE` is deliberately absent so index proposals can be
/// applied inside the rolled-back isolation scope.
pub const DEFAULT_FORBIDDEN_OPERATIONS: &[&str] = &[
    "DROP", "TRUNCATE", "DELETE", "UPDATE", "INSERT", "ALTER", "GRANT", "REVOKE",
];

/// Configuration for the verification and decision engine.
///
/// Construct via [`EngineConfig::default`] (tests) or
/// [`EngineConfig::from_env`] (binaries).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum proposal/validate cycles per request.
    pub max_attempts: u32,
    /// Minimum `baseline / candidate` elapsed-time ratio required to accept.
    /// Must be above 1.0: an equal-or-worse candidate is always rejected.
    pub min_speedup: f64,
    /// Timed executions per variant after the discarded warm-up run.
    pub timing_repeat_count: u32,
    /// Maximum relative spread `(max - min) / median` of timing samples
    /// before a measurement is declared inconclusive.
    pub variance_tolerance: f64,
    /// Epsilon grid applied to floating-point columns before hashing, so
    /// rewrites that reorder float aggregation still compare equal.
    pub float_epsilon: f64,
    /// Per-statement timeout for shadow executions, in seconds.
    pub shadow_timeout_secs: u64,
    /// Per-call timeout for the proposal source, in seconds.
    pub proposal_timeout_secs: u64,
    /// `LIMIT` appended to unbounded statements before shadow execution.
    pub max_result_rows: u64,
    /// Row count above which a sequential scan is tagged as a full-scan
    /// bottleneck.
    pub full_scan_row_threshold: i64,
    /// SQL keywords the security guard refuses to execute.
    pub forbidden_operations: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_speedup: 1.10,
            timing_repeat_count: 3,
            variance_tolerance: 0.5,
            float_epsilon: 1e-6,
            shadow_timeout_secs: 30,
            proposal_timeout_secs: 60,
            max_result_rows: 10_000,
            full_scan_row_threshold: 10_000,
            forbidden_operations: DEFAULT_FORBIDDEN_OPERATIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default  |
    /// |------------------------------------|----------|
    /// | `SQLSHADOW_MAX_ATTEMPTS`           | `3`      |
    /// | `SQLSHADOW_MIN_SPEEDUP`            | `1.10`   |
    /// | `SQLSHADOW_TIMING_REPEAT_COUNT`    | `3`      |
    /// | `SQLSHADOW_VARIANCE_TOLERANCE`     | `0.5`    |
    /// | `SQLSHADOW_FLOAT_EPSILON`          | `1e-6`   |
    /// | `SQLSHADOW_SHADOW_TIMEOUT_SECS`    | `30`     |
    /// | `SQLSHADOW_PROPOSAL_TIMEOUT_SECS`  | `60`     |
    /// | `SQLSHADOW_MAX_RESULT_ROWS`        | `10000`  |
    /// | `SQLSHADOW_FULL_SCAN_ROW_THRESHOLD`| `10000`  |
    ///
    /// Panics on unparseable values, which is the desired behaviour -- we
    /// want misconfiguration to fail fast at startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: env_parse("SQLSHADOW_MAX_ATTEMPTS", defaults.max_attempts),
            min_speedup: env_parse("SQLSHADOW_MIN_SPEEDUP", defaults.min_speedup),
            timing_repeat_count: env_parse(
                "SQLSHADOW_TIMING_REPEAT_COUNT",
                defaults.timing_repeat_count,
            ),
            variance_tolerance: env_parse(
                "SQLSHADOW_VARIANCE_TOLERANCE",
                defaults.variance_tolerance,
            ),
            float_epsilon: env_parse("SQLSHADOW_FLOAT_EPSILON", defaults.float_epsilon),
            shadow_timeout_secs: env_parse(
                "SQLSHADOW_SHADOW_TIMEOUT_SECS",
                defaults.shadow_timeout_secs,
            ),
            proposal_timeout_secs: env_parse(
                "SQLSHADOW_PROPOSAL_TIMEOUT_SECS",
                defaults.proposal_timeout_secs,
            ),
            max_result_rows: env_parse("SQLSHADOW_MAX_RESULT_ROWS", defaults.max_result_rows),
            full_scan_row_threshold: env_parse(
                "SQLSHADOW_FULL_SCAN_ROW_THRESHOLD",
                defaults.full_scan_row_threshold,
            ),
            forbidden_operations: defaults.forbidden_operations,
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid value (got '{raw}')")),
        Err(_) => default,
    }
}
