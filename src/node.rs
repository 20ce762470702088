//! Tree nodes and their lock guards.
//!
//! A [`Node`] is one directory: a name→child mapping plus the [`RwDrain`]
//! that guards it. Ownership points strictly downward - a parent's mapping
//! holds the only structural reference to each child, and there are no
//! parent pointers.
//!
//! # Guards
//!
//! [`ReadGuard`] and [`WriteGuard`] own the `Arc<Node>` they lock rather
//! than borrowing it. That is what makes hand-over-hand transfer
//! expressible: a walk can acquire the child's guard, then drop the
//! parent's, with no lifetime tying one to the other. Guards release on
//! every exit path, including `?`-returns and panics.
//!
//! `Arc` here is an ownership-transfer handle, not shared ownership of the
//! structure: the locking protocol guarantees a node is detached or
//! destroyed only at certified quiescence, so at most transient traversal
//! handles coexist with the parent's structural reference.

use std::cell::UnsafeCell;
use std::sync::Arc;

use hashlink::LinkedHashMap;

use crate::rwlock::RwDrain;

/// The name→child mapping carried by every node.
pub(crate) type ChildMap = LinkedHashMap<String, Arc<Node>>;

// ============================================================================
//  Node
// ============================================================================

/// One directory: a child mapping and the lock that guards it.
pub(crate) struct Node {
    rw: RwDrain,

    /// Guarded by `rw`. Read under reader or writer access; mutated only
    /// under writer access; walked without a guard only after `rw.drain()`
    /// while an ancestor writer lock keeps new operations out.
    children: UnsafeCell<ChildMap>,
}

// SAFETY: `children` is only reached through the guard types below and
// through `children_quiesced`, each of which follows the `rw` protocol, so
// a `&mut` never coexists with any other access.
unsafe impl Send for Node {}
// SAFETY: as above; shared references are handed out only under reader or
// writer access.
unsafe impl Sync for Node {}

impl Node {
    /// A fresh, empty directory.
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            rw: RwDrain::new(),
            children: UnsafeCell::new(ChildMap::new()),
        })
    }

    /// Block until this node is free of active and waiting readers and
    /// writers. Holds nothing on return.
    pub(crate) fn drain(&self) {
        self.rw.drain();
    }

    /// Access the mapping of a node certified quiescent.
    ///
    /// # Safety
    /// The caller must have observed `drain()` return on this node while a
    /// writer lock above the subtree prevents any new operation from
    /// entering it.
    pub(crate) unsafe fn children_quiesced(&self) -> &ChildMap {
        unsafe { &*self.children.get() }
    }
}

/// Guard acquisition on a node handle.
///
/// Guards own the handle they lock, so this lives on `Arc<Node>` rather
/// than `Node`: acquiring clones the handle into the guard.
pub(crate) trait Lockable {
    /// Acquire shared access.
    fn read(&self) -> ReadGuard;

    /// Acquire exclusive access.
    fn write(&self) -> WriteGuard;
}

impl Lockable for Arc<Node> {
    fn read(&self) -> ReadGuard {
        self.rw.read_acquire();
        ReadGuard {
            node: Arc::clone(self),
        }
    }

    fn write(&self) -> WriteGuard {
        self.rw.write_acquire();
        WriteGuard {
            node: Arc::clone(self),
        }
    }
}

// ============================================================================
//  Guards
// ============================================================================

/// Shared access to one node's mapping, released on drop.
#[must_use = "dropping the guard immediately releases reader access"]
pub(crate) struct ReadGuard {
    node: Arc<Node>,
}

impl ReadGuard {
    /// The guarded mapping.
    pub(crate) fn children(&self) -> &ChildMap {
        // SAFETY: reader access is held for `self`'s lifetime; writers are
        // excluded, so shared reads cannot race a mutation.
        unsafe { &*self.node.children.get() }
    }
}

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.node.rw.read_release();
    }
}

/// Exclusive access to one node's mapping, released on drop.
#[must_use = "dropping the guard immediately releases writer access"]
pub(crate) struct WriteGuard {
    node: Arc<Node>,
}

impl WriteGuard {
    /// The guarded mapping.
    pub(crate) fn children(&self) -> &ChildMap {
        // SAFETY: writer access is held for `self`'s lifetime.
        unsafe { &*self.node.children.get() }
    }

    /// The guarded mapping, mutably.
    pub(crate) fn children_mut(&mut self) -> &mut ChildMap {
        // SAFETY: writer access is exclusive, and `&mut self` rules out a
        // second outstanding reference through this guard.
        unsafe { &mut *self.node.children.get() }
    }
}

impl Drop for WriteGuard {
    fn drop(&mut self) {
        self.node.rw.write_release();
    }
}
