use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Mining is already running")]
    AlreadyRunning,

    #[error("Mining is not running")]
    NotRunning,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value: {field}, value: {value}, reason: {reason}")]
    InvalidValue { field: String, value: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Parse error: {error}")]
    ParseError { error: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn {name}: {error}")]
    SpawnFailed { name: String, error: String },

    #[error("{name} terminated unexpectedly")]
    UnexpectedExit { name: String },

    #[error("Failed to terminate {name}: {error}")]
    TerminationFailed { name: String, error: String },

    #[error("{name} has no process id")]
    MissingPid { name: String },
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Connection failed: {line}")]
    MarkerMatched { line: String },

    #[error("Mining process terminated unexpectedly")]
    ProcessDied,

    #[error("Mining process failed to start")]
    FailedToStart,

    #[error("Could not establish connection within {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to read config file {path}: {error}")]
    ReadFailed { path: String, error: String },

    #[error("Failed to write config file {path}: {error}")]
    WriteFailed { path: String, error: String },

    #[error("Failed to serialize config: {error}")]
    SerializeFailed { error: String },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Server start failed: {error}")]
    ServerStartFailed { error: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Internal server error: {error}")]
    InternalError { error: String },
}
