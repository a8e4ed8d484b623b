//! The chunk quadtree node.
//!
//! A node owns exactly zero or four children; children are created and
//! destroyed as an atomic set. Ownership is strictly top-down, so no parent
//! back-references are needed; every traversal is a recursion from a root.

use tracing::trace;

use super::{Chunk, ChunkStatus};
use crate::geodetic::Quad;

/// One node of the chunk quadtree. Leaves carry the renderable state;
/// internal nodes only route recursion.
pub struct ChunkNode {
    chunk: Chunk,
    children: Option<Box<[ChunkNode; 4]>>,
}

impl ChunkNode {
    pub fn new(chunk: Chunk) -> Self {
        Self {
            chunk,
            children: None,
        }
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn child(&self, quad: Quad) -> Option<&ChunkNode> {
        self.children.as_ref().map(|c| &c[quad as usize])
    }

    /// Splits a leaf into four children, recursing to `depth` levels.
    /// Splitting a non-leaf only deepens its existing children.
    pub fn split(&mut self, depth: u8) {
        if depth == 0 {
            return;
        }
        if self.is_leaf() {
            let index = *self.chunk.index();
            self.children = Some(Box::new(
                Quad::ALL.map(|quad| ChunkNode::new(Chunk::new(index.child(quad)))),
            ));
            trace!(index = %index, "split chunk");
        }
        if depth > 1 {
            if let Some(children) = &mut self.children {
                for child in children.iter_mut() {
                    child.split(depth - 1);
                }
            }
        }
    }

    /// Recursively merges all descendants, leaving this node a leaf.
    pub fn merge(&mut self) {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.merge();
            }
        }
        self.children = None;
        debug_assert!(self.is_leaf());
    }

    /// Per-frame tree maintenance. Leaves evaluate `decide` and split on
    /// demand; internal nodes merge only when **all four** children signal
    /// a merge wish in this same pass, and then re-evaluate immediately so
    /// a freshly merged node may re-split within the frame.
    ///
    /// Returns whether this subtree wants to be merged away by its parent.
    pub fn update_chunk_tree(
        &mut self,
        decide: &mut dyn FnMut(&mut Chunk) -> ChunkStatus,
    ) -> bool {
        if self.is_leaf() {
            match decide(&mut self.chunk) {
                ChunkStatus::WantSplit => {
                    self.split(1);
                    false
                }
                ChunkStatus::WantMerge => true,
                ChunkStatus::DoNothing => false,
            }
        } else {
            let mut all_want_merge = true;
            if let Some(children) = &mut self.children {
                for child in children.iter_mut() {
                    // No short-circuit: every child must be updated this
                    // pass even after one has dissented.
                    let wants_merge = child.update_chunk_tree(decide);
                    all_want_merge &= wants_merge;
                }
            }

            if all_want_merge {
                self.merge();
                return self.update_chunk_tree(decide);
            }
            false
        }
    }

    /// Visits every leaf chunk. Rendering recurses to leaves only; internal
    /// nodes carry no visual payload.
    pub fn for_each_leaf<'a>(&'a self, visit: &mut dyn FnMut(&'a Chunk)) {
        match &self.children {
            None => visit(&self.chunk),
            Some(children) => {
                for child in children.iter() {
                    child.for_each_leaf(visit);
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match &self.children {
            None => 1,
            Some(children) => children.iter().map(|c| c.leaf_count()).sum(),
        }
    }

    pub fn node_count(&self) -> usize {
        match &self.children {
            None => 1,
            Some(children) => 1 + children.iter().map(|c| c.node_count()).sum::<usize>(),
        }
    }

    /// Depth of the deepest leaf below (and including) this node.
    pub fn max_depth(&self) -> u8 {
        match &self.children {
            None => self.chunk.index().level,
            Some(children) => children.iter().map(|c| c.max_depth()).max().unwrap_or(0),
        }
    }
}
