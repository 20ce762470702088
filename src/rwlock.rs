//! Per-node reader/writer/drain synchronization.
//!
//! [`RwDrain`] is the lock instance carried by every node. It serves three
//! access classes:
//!
//! 1. **Readers** - shared access for traversal and listing.
//! 2. **Writers** - exclusive access for mutating the node's child mapping.
//! 3. **Drain** - a lowest-priority wait that is granted only when the node
//!    has zero active *and* zero waiting readers and writers. Drain holds
//!    nothing on return: it certifies a moment of total quiescence, which
//!    stays meaningful only while an ancestor writer lock keeps new
//!    operations from entering the branch.
//!
//! # Fairness
//!
//! An arriving reader yields to an active writer, to *waiting* writers, and
//! to a pending hand-off, so a continuous reader stream cannot starve
//! writers. The last reader out hands off to one waiting writer; a
//! releasing writer hands off to waiting readers first, then to a waiting
//! writer, and wakes a drain waiter only when neither class has interest.
//! The single-use hand-off flag transfers priority to the woken side and is
//! consumed by the woken thread before it rechecks its entry condition;
//! a newly admitted reader re-arms the flag to cascade the whole waiting
//! reader batch in.
//!
//! # Blocking model
//!
//! All waiting is on OS-level condition variables; there is no timeout and
//! no cancellation. A thread blocked here stays blocked until the lock
//! state allows it through.

use parking_lot::{Condvar, Mutex};

// ============================================================================
//  State
// ============================================================================

/// Counters guarded by the state mutex.
#[derive(Debug, Default)]
struct State {
    /// Readers currently inside.
    active_readers: u32,

    /// Writers currently inside (0 or 1).
    active_writers: u32,

    /// Readers blocked on the reader queue.
    waiting_readers: u32,

    /// Writers blocked on the writer queue.
    waiting_writers: u32,

    /// A priority hand-off is in flight; the woken thread consumes it.
    handoff: bool,
}

impl State {
    fn at_rest(&self) -> bool {
        self.active_readers == 0
            && self.active_writers == 0
            && self.waiting_readers == 0
            && self.waiting_writers == 0
    }
}

// ============================================================================
//  RwDrain
// ============================================================================

/// A reader/writer lock with an additional lowest-priority drain barrier.
///
/// Unlike library RW locks, release is decoupled from an RAII guard at this
/// level: the node layer wraps acquisition in guards that own the node
/// handle, which is what makes hand-over-hand transfer between nodes
/// expressible. Acquire/release calls must be paired by the caller.
#[derive(Debug, Default)]
pub struct RwDrain {
    state: Mutex<State>,
    readers: Condvar,
    writers: Condvar,
    drained: Condvar,
}

impl RwDrain {
    /// Create an unlocked instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire shared access.
    ///
    /// Blocks while a writer is active, a writer is waiting, or a pending
    /// hand-off favors the writer side.
    pub fn read_acquire(&self) {
        let mut s = self.state.lock();

        if s.active_writers > 0 || s.waiting_writers > 0 || s.handoff {
            let mut woken = false;
            while !woken || s.active_writers > 0 || s.handoff {
                woken = true;
                s.waiting_readers += 1;
                self.readers.wait(&mut s);
                s.waiting_readers -= 1;
                s.handoff = false;
            }
        }

        s.active_readers += 1;

        // Cascade: admit the rest of the waiting reader batch one wake at
        // a time, re-arming the hand-off so late writers keep their turn.
        if s.waiting_readers > 0 {
            s.handoff = true;
            self.readers.notify_one();
        }
    }

    /// Release shared access.
    pub fn read_release(&self) {
        let mut s = self.state.lock();
        debug_assert!(s.active_readers > 0, "read_release without reader");

        s.active_readers -= 1;

        if s.active_readers == 0 && s.waiting_writers > 0 {
            s.handoff = true;
            self.writers.notify_one();
        } else {
            self.drained.notify_one();
        }
    }

    /// Acquire exclusive access.
    ///
    /// Blocks while any reader or writer is active or a hand-off is
    /// pending.
    pub fn write_acquire(&self) {
        let mut s = self.state.lock();

        while s.active_readers > 0 || s.active_writers > 0 || s.handoff {
            s.waiting_writers += 1;
            self.writers.wait(&mut s);
            s.waiting_writers -= 1;
            s.handoff = false;
        }

        s.active_writers += 1;
    }

    /// Release exclusive access.
    ///
    /// Prefers waking a waiting reader, then a waiting writer, then a
    /// drain waiter.
    pub fn write_release(&self) {
        let mut s = self.state.lock();
        debug_assert_eq!(s.active_writers, 1, "write_release without writer");

        s.active_writers -= 1;

        if s.waiting_readers > 0 {
            s.handoff = true;
            self.readers.notify_one();
        } else if s.waiting_writers > 0 {
            s.handoff = true;
            self.writers.notify_one();
        } else {
            self.drained.notify_one();
        }
    }

    /// Wait for total quiescence: zero active and zero waiting readers and
    /// writers.
    ///
    /// Holds nothing on return. Callers keep the certificate valid by
    /// already holding a writer lock on an ancestor, which stops new
    /// operations from entering the branch.
    pub fn drain(&self) {
        let mut s = self.state.lock();

        while !s.at_rest() {
            self.drained.wait(&mut s);
        }
    }

    /// Snapshot of quiescence, for assertions.
    #[cfg(test)]
    pub(crate) fn is_quiescent(&self) -> bool {
        self.state.lock().at_rest()
    }
}
