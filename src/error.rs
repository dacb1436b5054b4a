use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum SimulatorError {
    #[error("Failed to read fixture {path}: {source}")]
    FixtureIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),

    #[error("Duplicate device name in registry: {0}")]
    DuplicateDevice(String),

    #[error("Failed to bind simulator listener on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Simulator server error: {0}")]
    ServerFailed(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
