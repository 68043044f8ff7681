use crate::error::{Result, TreeError};
use crate::host::{HostId, HostTree};
use smallvec::SmallVec;
use smartstring::{LazyCompact, SmartString};

#[derive(Debug)]
pub enum StagedChild {
    Tree(Box<LazySubtree>),
    Node(HostId),
}

impl From<LazySubtree> for StagedChild {
    fn from(tree: LazySubtree) -> Self {
        StagedChild::Tree(Box::new(tree))
    }
}

impl From<HostId> for StagedChild {
    fn from(node: HostId) -> Self {
        StagedChild::Node(node)
    }
}

/// A subtree accumulated off the live tree and attached in one operation.
///
/// Queue order becomes host sibling order. A subtree is either a text leaf
/// or a structural node, never both, and materializes exactly once.
#[derive(Debug)]
pub struct LazySubtree {
    root: HostId,
    children: SmallVec<[StagedChild; 4]>,
    text: Option<SmartString<LazyCompact>>,
    materialized: bool,
}

impl LazySubtree {
    pub fn new(root: HostId) -> Self {
        Self {
            root,
            children: SmallVec::new(),
            text: None,
            materialized: false,
        }
    }

    pub fn root(&self) -> HostId {
        self.root
    }

    pub fn queue_child(&mut self, child: impl Into<StagedChild>) -> Result<()> {
        if self.materialized {
            return Err(TreeError::AlreadyMaterialized);
        }
        if self.text.is_some() {
            return Err(TreeError::InvalidState);
        }
        self.children.push(child.into());
        Ok(())
    }

    pub fn queue_text(&mut self, text: impl Into<SmartString<LazyCompact>>) -> Result<()> {
        if self.materialized {
            return Err(TreeError::AlreadyMaterialized);
        }
        if !self.children.is_empty() {
            return Err(TreeError::InvalidState);
        }
        self.text = Some(text.into());
        Ok(())
    }

    /// Attaches every queued child (depth-first, queue order) under the root,
    /// or sets the text payload as its sole content, and returns the root.
    pub fn materialize<H: HostTree>(&mut self, host: &mut H) -> Result<HostId> {
        if self.materialized {
            return Err(TreeError::AlreadyMaterialized);
        }
        self.materialized = true;
        let root = self.root;
        if let Some(text) = self.text.take() {
            host.set_text(root, &text);
            return Ok(root);
        }
        for child in self.children.drain(..) {
            let node = match child {
                StagedChild::Tree(mut tree) => tree.materialize(host)?,
                StagedChild::Node(node) => node,
            };
            host.insert_before(root, node, None);
        }
        Ok(root)
    }
}
