use thiserror::Error;

/// A set of mutually dependent entity types, reported by graph queries.
///
/// Graph construction itself never fails; cyclic schemas stay registered and
/// are resolved lazily at runtime. This error is the structured result of the
/// advisory ordering queries only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("dependency cycle detected: {cycles:?}")]
pub struct CycleError {
    pub cycles: Vec<Vec<String>>,
}

#[derive(Error, Debug)]
pub enum EntigraphError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error on {entity}.{field}: {reason}")]
    Parse {
        entity: String,
        field: String,
        reason: String,
    },

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("Generation failed for {entity}.{field}: {reason}")]
    Generation {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("Resolve depth {depth} exceeded at {entity}.{field}")]
    DepthExceeded {
        entity: String,
        field: String,
        depth: usize,
    },

    #[error("Duplicate definition: {0}")]
    DuplicateDefinition(String),

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, EntigraphError>;
