use crate::host::HostId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("lazy subtree cannot hold both text and queued children")]
    InvalidState,

    #[error("lazy subtree has already been materialized")]
    AlreadyMaterialized,

    #[error("no matching close marker for text region opened at {marker:?}")]
    MissingCloseMarker { marker: HostId },

    #[error("instruction references node {node:?} which is not a child of {parent:?}")]
    DanglingReference { parent: HostId, node: HostId },
}

pub type Result<T> = std::result::Result<T, TreeError>;
