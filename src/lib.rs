//! Adapter layer between an external virtual-tree differ and a live host
//! tree: stages new subtrees off-tree, holds text runs between marker nodes,
//! and applies ordered child-update instructions against one parent at a
//! time.

pub mod apply;
pub mod error;
pub mod host;
pub mod mount;
pub mod region;
pub mod stage;

pub use apply::{InsertContent, UpdateInstruction};
pub use error::{Result, TreeError};
pub use host::{HostId, HostTree, MemoryTree};
pub use mount::{
    ChildDiffer, ChildSpec, Container, Content, ElementNode, Environment, LogicalId, MountScope,
    MountedChild, NodeSpec,
};
pub use region::{MarkerIds, TextRegion};
pub use stage::{LazySubtree, StagedChild};
