use arrow::error::ArrowError;
use thiserror::Error;

pub type Result<T, E = GeoQueryError> = std::result::Result<T, E>;

/// Errors raised while marshaling inputs or answering spatial queries.
///
/// Every query is a pure computation over immutable data, so none of these
/// are transient.
#[derive(Debug, Error)]
pub enum GeoQueryError {
    /// The caller-provided batch violates the input contract: unknown
    /// geometry kind, malformed row delimiters, bad coordinate dimension or
    /// an invalid query argument such as a negative radius.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Nearest-neighbor queries have no answer without targets.
    #[error("Target geometry set is empty")]
    EmptyTargetSet,

    /// The geometry has no vertices and therefore no envelope.
    #[error("Geometry without vertices has no envelope")]
    EmptyGeometry,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

impl GeoQueryError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        GeoQueryError::InvalidInput(message.into())
    }
}
