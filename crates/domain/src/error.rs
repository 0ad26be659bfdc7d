//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors; adapters convert their
//! transport-specific failures into [`LinkError`] via `From`.

use uuid::Uuid;

/// Boxed source error carried by transport and collaborator failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the wireless attribute link, in either role.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The operation needs an established connection and there is none.
    #[error("not connected")]
    NotConnected,

    /// The remote service or attribute could not be found.
    #[error("attribute {attribute} not found in service {service}")]
    AttributeNotFound {
        /// Service that was searched.
        service: Uuid,
        /// Attribute that was requested.
        attribute: Uuid,
    },

    /// The underlying link stack reported an error.
    #[error("transport error")]
    Transport(#[source] BoxError),

    /// A bounded wait elapsed with no data.
    #[error("timed out")]
    Timeout,

    /// A control write carried an opcode the receiving device does not know.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
}

impl LinkError {
    /// Wrap any transport failure.
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }

    /// Whether the orchestrator should treat the failure as a lost device
    /// and schedule a rescan.
    #[must_use]
    pub fn is_recoverable_by_rescan(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::Timeout | Self::Transport(_)
        )
    }
}

/// Failures while sending or receiving a fragmented stream message.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The first delivery was too short to hold the fragment-count header.
    #[error("stream header must be 4 bytes, got {actual}")]
    ShortHeader {
        /// Number of bytes actually delivered.
        actual: usize,
    },

    /// A fragment carried more than the 20-byte fragment payload.
    #[error("stream fragment must be at most 20 bytes, got {actual}")]
    OversizedFragment {
        /// Number of bytes actually delivered.
        actual: usize,
    },

    /// The reassembled payload is not valid UTF-8.
    #[error("stream payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The link failed while frames were in flight.
    #[error("stream link error")]
    Link(#[from] LinkError),
}

/// Failures reported by external collaborators (Wi-Fi, backend).
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator cannot be reached right now.
    #[error("collaborator unavailable")]
    Unavailable,

    /// The collaborator rejected or failed the request.
    #[error("collaborator request failed")]
    Failed(#[source] BoxError),
}
