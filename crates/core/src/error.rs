//! Typed keeper errors.
//!
//! `Read` and `DataIntegrity` are scoped to one entity and are recovered by
//! skipping it. `Connectivity` escapes the iteration and sends the scheduler
//! into backoff. `Config` only occurs at startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeeperError {
    /// The ledger could not be reached or refused a global read.
    #[error("ledger unreachable while reading {what}: {source}")]
    Connectivity {
        what: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A read for a single entity failed.
    #[error("failed to read {entity}: {source}")]
    Read {
        entity: String,
        #[source]
        source: anyhow::Error,
    },

    /// The ledger returned a value the keepers cannot evaluate.
    #[error("invalid data for {entity}: {reason}")]
    DataIntegrity { entity: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl KeeperError {
    pub fn connectivity(what: &'static str, source: anyhow::Error) -> Self {
        KeeperError::Connectivity { what, source }
    }

    pub fn read(entity: impl Into<String>, source: anyhow::Error) -> Self {
        KeeperError::Read {
            entity: entity.into(),
            source,
        }
    }

    pub fn data_integrity(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        KeeperError::DataIntegrity {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Short kind label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            KeeperError::Connectivity { .. } => "connectivity",
            KeeperError::Read { .. } => "read",
            KeeperError::DataIntegrity { .. } => "data_integrity",
            KeeperError::Config(_) => "config",
        }
    }

    /// Whether the error is limited to one entity and the iteration may continue.
    pub fn is_entity_scoped(&self) -> bool {
        matches!(
            self,
            KeeperError::Read { .. } | KeeperError::DataIntegrity { .. }
        )
    }
}

pub type KeeperResult<T> = Result<T, KeeperError>;
