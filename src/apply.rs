use crate::error::{Result, TreeError};
use crate::host::{HostId, HostTree};
use crate::region::TextRegion;
use crate::stage::LazySubtree;
use smartstring::{LazyCompact, SmartString};
use tracing::trace;

#[derive(Debug)]
pub enum InsertContent {
    Subtree(LazySubtree),
    Text(SmartString<LazyCompact>),
}

/// One typed child operation against a single parent.
///
/// `after = None` means "as first child". Anchors are resolved against the
/// host tree's current state, including earlier instructions in the batch.
#[derive(Debug)]
pub enum UpdateInstruction {
    Insert {
        content: InsertContent,
        after: Option<HostId>,
    },
    Move {
        node: HostId,
        after: Option<HostId>,
    },
    Remove {
        node: HostId,
    },
    TextUpdate {
        node: HostId,
        text: SmartString<LazyCompact>,
    },
}

fn reference_for<H: HostTree>(
    host: &H,
    parent: HostId,
    after: Option<HostId>,
) -> Result<Option<HostId>> {
    match after {
        Some(anchor) => {
            if host.parent(anchor) != Some(parent) {
                return Err(TreeError::DanglingReference {
                    parent,
                    node: anchor,
                });
            }
            Ok(host.next_sibling(anchor))
        }
        None => Ok(host.first_child(parent)),
    }
}

/// Applies a batch of instructions to `parent`, strictly in order.
///
/// A failing instruction aborts the batch; instructions already applied are
/// not rolled back.
pub fn apply<H: HostTree>(
    host: &mut H,
    parent: HostId,
    batch: Vec<UpdateInstruction>,
) -> Result<()> {
    for instruction in batch {
        trace!(?parent, ?instruction, "applying child update");
        match instruction {
            UpdateInstruction::Insert { content, after } => {
                let node = match content {
                    InsertContent::Subtree(mut tree) => tree.materialize(host)?,
                    InsertContent::Text(text) => host.create_text_node(&text),
                };
                let reference = reference_for(host, parent, after)?;
                host.insert_before(parent, node, reference);
            }
            UpdateInstruction::Move { node, after } => {
                if host.parent(node) != Some(parent) {
                    return Err(TreeError::DanglingReference { parent, node });
                }
                // Detach first so the anchor's sibling chain no longer
                // contains the moved node.
                host.remove_child(parent, node);
                let reference = reference_for(host, parent, after)?;
                host.insert_before(parent, node, reference);
            }
            UpdateInstruction::Remove { node } => {
                if host.parent(node) != Some(parent) {
                    return Err(TreeError::DanglingReference { parent, node });
                }
                host.remove_child(parent, node);
            }
            UpdateInstruction::TextUpdate { node, text } => {
                TextRegion::from_open(host, node)?.replace(host, &text)?;
            }
        }
    }
    Ok(())
}
