//! Concurrent directory tree with hand-over-hand path locking.
//!
//! Every operation starts at the root and walks downward, holding at most
//! two node locks at a time during the walk: the next node's lock is
//! acquired before the current node's is released, so the path segment the
//! operation depends on can never be mutated underneath it.
//!
//! # Locking discipline
//!
//! ```text
//! list(p):      readers all the way down; snapshot names at the terminal.
//! create(p):    readers to the parent of p, writer on the parent, insert.
//! remove(p):    readers to the parent, writer on the parent, drain the
//!               target subtree, detach.
//! rename(s, t): readers to the LCA of s and t, writer on the LCA, then
//!               two independent downward walks (readers on intermediates,
//!               writer on each final parent), drain of the source
//!               subtree, one detach/attach.
//! ```
//!
//! Locks are only ever taken parent-before-child, and a child's lock is
//! only taken while its parent's is held, so lock order follows tree order
//! and cycles are impossible. The single deliberate divergence - the two
//! walks below the LCA during `rename` - cannot deadlock either: the LCA
//! writer serializes competing structural operations through that branch
//! point, and the two walks descend into disjoint subtrees (equal source
//! and target are handled as a no-op before any divergence).
//!
//! # Quiescence
//!
//! Detaching a subtree (for removal or relocation) first brings every node
//! in it to rest via the drain barrier, visited top-down. The parent's
//! writer lock keeps new operations out of the subtree, and an operation
//! still inside can only move downward and finish, so the sweep terminates
//! and its certificate holds through the detach.

use std::sync::Arc;

use crate::error::{Result, TreeError};
use crate::node::{Lockable, Node, ReadGuard, WriteGuard};
use crate::path;
use crate::trace::debug_log;


// ============================================================================
//  DirTree
// ============================================================================

/// A concurrent in-memory directory tree.
///
/// The tree starts with only the root directory `"/"`. All operations are
/// callable from any number of threads concurrently; blocking is on
/// per-node locks along the operated-on path only, so operations in
/// disjoint branches proceed in parallel.
///
/// Dropping the tree releases every directory recursively; exclusive
/// ownership (`&mut`/move semantics) guarantees no operation is in flight
/// at that point.
///
/// # Example
///
/// ```rust
/// use dirtree::DirTree;
///
/// let tree = DirTree::new();
/// tree.create("/home/").unwrap();
/// tree.create("/home/ada/").unwrap();
/// assert_eq!(tree.list("/home/").unwrap(), vec!["ada".to_string()]);
///
/// tree.rename("/home/ada/", "/home/grace/").unwrap();
/// tree.remove("/home/grace/").unwrap();
/// assert!(tree.list("/home/").unwrap().is_empty());
/// ```
pub struct DirTree {
    root: Arc<Node>,
}

impl DirTree {
    /// Create a tree containing only the root directory `"/"`.
    #[must_use]
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// List the names of the immediate children of the directory at
    /// `target`, in unspecified order.
    ///
    /// # Errors
    /// [`TreeError::InvalidPath`] for malformed paths,
    /// [`TreeError::NotFound`] when any component does not exist.
    pub fn list(&self, target: &str) -> Result<Vec<String>> {
        path::validate(target)?;

        let guard = self.walk_read(target)?;
        Ok(guard.children().keys().cloned().collect())
    }

    /// Create an empty directory at `target`.
    ///
    /// # Errors
    /// [`TreeError::InvalidPath`] for malformed paths,
    /// [`TreeError::AlreadyExists`] when `target` is `"/"` or the final
    /// component already exists, [`TreeError::NotFound`] when an
    /// intermediate component is missing.
    pub fn create(&self, target: &str) -> Result<()> {
        path::validate(target)?;
        let Some((parent, name)) = path::split_parent(target) else {
            return Err(TreeError::AlreadyExists);
        };

        let mut guard = self.walk_write(parent)?;
        if guard.children().contains_key(name) {
            return Err(TreeError::AlreadyExists);
        }
        guard.children_mut().insert(name.to_owned(), Node::new());

        debug_log!(path = target, "created directory");
        Ok(())
    }

    /// Remove the empty directory at `target`.
    ///
    /// The target subtree is brought to rest before it is detached, so no
    /// operation is mid-flight inside it when it is torn down.
    ///
    /// # Errors
    /// [`TreeError::InvalidPath`] for malformed paths, [`TreeError::Busy`]
    /// for `"/"`, [`TreeError::NotFound`] when the target or an
    /// intermediate component is missing, [`TreeError::NotEmpty`] when the
    /// target still has children.
    pub fn remove(&self, target: &str) -> Result<()> {
        path::validate(target)?;
        let Some((parent, name)) = path::split_parent(target) else {
            return Err(TreeError::Busy);
        };

        let mut guard = self.walk_write(parent)?;
        let victim = guard
            .children()
            .get(name)
            .cloned()
            .ok_or(TreeError::NotFound)?;

        // The emptiness check takes a short reader on the target, acquired
        // while the parent writer is held; operations still deeper in the
        // subtree cannot add entries to this mapping, so the answer holds
        // through the detach below.
        let empty = victim.read().children().is_empty();
        if !empty {
            return Err(TreeError::NotEmpty);
        }

        quiesce(&victim);
        guard.children_mut().remove(name);

        debug_log!(path = target, "removed directory");
        Ok(())
    }

    /// Move the subtree at `source` to `target`, preserving its contents
    /// and identity.
    ///
    /// Equal `source` and `target` are a validated no-op. The relocation
    /// is atomic to observers: the subtree is visible at exactly one of
    /// the two locations at any instant, never both and never neither.
    ///
    /// # Errors
    /// [`TreeError::InvalidPath`] for malformed paths, [`TreeError::Busy`]
    /// when `source` is `"/"`, [`TreeError::AlreadyExists`] when `target`
    /// is `"/"` or already exists, [`TreeError::RelatedPaths`] when one
    /// path is a proper ancestor of the other, [`TreeError::NotFound`]
    /// when the source or either parent chain is missing.
    pub fn rename(&self, source: &str, target: &str) -> Result<()> {
        path::validate(source)?;
        path::validate(target)?;
        let Some((src_parent, src_name)) = path::split_parent(source) else {
            return Err(TreeError::Busy);
        };
        let Some((tgt_parent, tgt_name)) = path::split_parent(target) else {
            return Err(TreeError::AlreadyExists);
        };
        if path::are_related(source, target) {
            return Err(TreeError::RelatedPaths);
        }

        // Writer on the branch point; everything below happens in its
        // shadow, so competing structural operations routed through this
        // ancestor are serialized while disjoint branches stay untouched.
        let branch = path::lca(source, target);
        let mut lca_guard = self.walk_write(branch)?;

        if source == target {
            return Ok(());
        }

        // Both parents lie on or below the branch point. A `"/"` relative
        // parent means the parent *is* the branch node, whose writer lock
        // is already held and must not be taken twice.
        let src_parent_rel = &src_parent[branch.len() - 1..];
        let tgt_parent_rel = &tgt_parent[branch.len() - 1..];

        let mut src_pg = walk_write_below(&lca_guard, src_parent_rel)?;
        let subtree = match src_pg.as_ref() {
            Some(g) => g.children().get(src_name).cloned(),
            None => lca_guard.children().get(src_name).cloned(),
        }
        .ok_or(TreeError::NotFound)?;

        // The subtree is about to be detached and reattached elsewhere;
        // wait out every operation still inside it first.
        quiesce(&subtree);

        let mut tgt_pg = walk_write_below(&lca_guard, tgt_parent_rel)?;
        let occupied = match tgt_pg.as_ref() {
            Some(g) => g.children().contains_key(tgt_name),
            None => lca_guard.children().contains_key(tgt_name),
        };
        if occupied {
            return Err(TreeError::AlreadyExists);
        }

        let detached = match src_pg.as_mut() {
            Some(g) => g.children_mut().remove(src_name),
            None => lca_guard.children_mut().remove(src_name),
        };
        debug_assert!(detached.is_some(), "source vanished under its writer lock");
        match tgt_pg.as_mut() {
            Some(g) => {
                g.children_mut().insert(tgt_name.to_owned(), subtree);
            }
            None => {
                lca_guard.children_mut().insert(tgt_name.to_owned(), subtree);
            }
        }

        debug_log!(from = source, to = target, "moved subtree");

        // Release in reverse acquisition order: target parent, source
        // parent, branch point last.
        drop(tgt_pg);
        drop(src_pg);
        drop(lca_guard);
        Ok(())
    }

    // ========================================================================
    //  Walks
    // ========================================================================

    /// Hand-over-hand reader walk to the node at `target`.
    fn walk_read(&self, target: &str) -> Result<ReadGuard> {
        let mut cur = self.root.read();
        let mut rest = target;

        while let Some((name, tail)) = path::split_first(rest) {
            let child = cur
                .children()
                .get(name)
                .cloned()
                .ok_or(TreeError::NotFound)?;
            let next = child.read();
            drop(cur);
            cur = next;
            rest = tail;
        }

        Ok(cur)
    }

    /// Hand-over-hand walk to the node at `target`: readers on the way
    /// down, writer on the terminal node.
    fn walk_write(&self, target: &str) -> Result<WriteGuard> {
        let Some((mid, last)) = path::split_parent(target) else {
            return Ok(self.root.write());
        };

        let mut cur = self.root.read();
        let mut rest = mid;
        while let Some((name, tail)) = path::split_first(rest) {
            let child = cur
                .children()
                .get(name)
                .cloned()
                .ok_or(TreeError::NotFound)?;
            let next = child.read();
            drop(cur);
            cur = next;
            rest = tail;
        }

        let child = cur
            .children()
            .get(last)
            .cloned()
            .ok_or(TreeError::NotFound)?;
        let guard = child.write();
        drop(cur);
        Ok(guard)
    }
}

impl Default for DirTree {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  Helpers
// ============================================================================

/// Hand-over-hand descent starting below an already write-locked node:
/// readers on intermediates, writer on the node at `rel`.
///
/// Returns `None` when `rel` is `"/"`: the requested node is `start`
/// itself, whose writer lock the caller already holds (taking it again
/// would self-deadlock). The `start` lock is never released here.
fn walk_write_below(start: &WriteGuard, rel: &str) -> Result<Option<WriteGuard>> {
    let Some((mid, last)) = path::split_parent(rel) else {
        return Ok(None);
    };

    let mut cur: Option<ReadGuard> = None;
    let mut rest = mid;
    while let Some((name, tail)) = path::split_first(rest) {
        let map = cur
            .as_ref()
            .map_or_else(|| start.children(), ReadGuard::children);
        let child = map.get(name).cloned().ok_or(TreeError::NotFound)?;
        let next = child.read();
        drop(cur);
        cur = Some(next);
        rest = tail;
    }

    let map = cur
        .as_ref()
        .map_or_else(|| start.children(), ReadGuard::children);
    let child = map.get(last).cloned().ok_or(TreeError::NotFound)?;
    let guard = child.write();
    drop(cur);
    Ok(Some(guard))
}

/// Bring every node of a subtree to rest, top-down.
///
/// Valid only while a writer lock above the subtree keeps new operations
/// out; operations still inside can only move downward and finish.
fn quiesce(node: &Arc<Node>) {
    node.drain();

    // SAFETY: this node just certified quiescent and the branch above is
    // write-locked, so nothing concurrently touches the mapping.
    let children = unsafe { node.children_quiesced() };
    for child in children.values() {
        quiesce(child);
    }
}
