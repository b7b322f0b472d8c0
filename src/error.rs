use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `scriptcron`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum Error {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Sandbox ──────────────────────────────────────────────────────────
    #[error("sandbox: {0}")]
    Sandbox(#[from] SandboxError),

    // ── Scripts / loader ─────────────────────────────────────────────────
    #[error("script: {0}")]
    Script(#[from] ScriptError),

    // ── Approval gate ────────────────────────────────────────────────────
    #[error("approval: {0}")]
    Approval(#[from] ApprovalError),

    // ── Scheduler ────────────────────────────────────────────────────────
    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Sandbox errors ──────────────────────────────────────────────────────────

/// Every way a single script execution can fail.
///
/// These never escape as panics; the sandbox renders them into
/// `ExecutionResult::error`.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("compile error in {script}: {message}")]
    Compile { script: String, message: String },

    #[error("runtime error in {script}: {message}")]
    Runtime { script: String, message: String },

    #[error("function `{0}` not found")]
    FunctionNotFound(String),

    #[error("`{0}` is not a function")]
    NotAFunction(String),

    #[error("invalid host function name `{0}`")]
    InvalidFunctionName(String),

    #[error("execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("execution cancelled")]
    Cancelled,

    #[error("execution aborted: {0}")]
    Aborted(String),
}

// ─── Capability errors ───────────────────────────────────────────────────────

/// Violations and failures inside the injected capability modules.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("unsupported URL scheme `{0}` (only http and https are allowed)")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("response body exceeds {limit} byte limit")]
    ResponseTooLarge { limit: usize },

    #[error("http request failed: {0}")]
    Http(String),

    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

// ─── Script / loader errors ──────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("invalid script name `{0}`")]
    InvalidName(String),

    #[error("script `{name}` not found at {path}")]
    NotFound { name: String, path: String },

    #[error("failed to read {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("script not approved: {0}")]
    NotApproved(ApprovalError),
}

impl From<ApprovalError> for ScriptError {
    fn from(err: ApprovalError) -> Self {
        Self::NotApproved(err)
    }
}

// ─── Approval errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("{script} is not approved for execution")]
    Denied { script: String },

    #[error("approval gate unavailable: {0}")]
    Unavailable(String),
}

// ─── Scheduler errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("schedule {0} not found")]
    NotFound(String),

    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("agent engine not configured")]
    EngineUnavailable,

    #[error("schedule {id} is missing `{field}`")]
    MissingField { id: String, field: &'static str },

    #[error("{kind} job timed out after {secs}s")]
    Timeout { kind: &'static str, secs: u64 },

    #[error("store: {0}")]
    Store(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;
