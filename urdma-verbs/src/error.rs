//! Error taxonomy shared by the core boundary and providers.

use crate::qp::{QpAttrMask, QpState};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, VerbsError>;

#[derive(Debug, Error)]
pub enum VerbsError {
    /// Device or descriptor allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// The core rejected a registration (name collision or otherwise).
    #[error("device registration failed: {0}")]
    Registration(String),

    /// A companion subsystem module could not be loaded.
    #[error("required module {0} unavailable")]
    MissingDependency(String),

    #[error("no GID at index {index} (table length {len})")]
    InvalidGidIndex { index: u32, len: u32 },

    #[error("port {port} out of range (device has {count})")]
    InvalidPort { port: u8, count: u8 },

    #[error("illegal queue pair transition {from:?} -> {to:?}")]
    InvalidTransition { from: QpState, to: QpState },

    #[error("modify mask {given:?} is missing required bits {required:?}")]
    InsufficientMask {
        given: QpAttrMask,
        required: QpAttrMask,
    },
}
