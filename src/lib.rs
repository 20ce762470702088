//! # `DirTree`
//!
//! A concurrent in-memory hierarchical namespace: a tree of named
//! directories safely mutated and queried by many threads at once.
//!
//! Each node carries its own reader/writer/drain lock, and every operation
//! walks the tree hand-over-hand - the next node's lock is acquired before
//! the current node's is released - so unrelated branches never contend
//! and the locked path can never be mutated underneath a walk.
//!
//! | Operation | Locking |
//! |-----------|---------|
//! | `list`    | readers down the whole path |
//! | `create`  | readers down, writer on the final parent |
//! | `remove`  | readers down, writer on the parent, subtree drain |
//! | `rename`  | writer on the LCA, two independent walks below it |
//!
//! ## Thread Safety
//!
//! [`DirTree`] is `Send + Sync`; all operations take `&self` and may be
//! called from any number of threads:
//!
//! ```rust
//! use dirtree::DirTree;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let tree = Arc::new(DirTree::new());
//! tree.create("/shared/").unwrap();
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|i| {
//!         let tree = Arc::clone(&tree);
//!         thread::spawn(move || tree.create(&format!("/shared/worker{i}/")))
//!     })
//!     .collect();
//! for h in handles {
//!     h.join().unwrap().unwrap();
//! }
//!
//! assert_eq!(tree.list("/shared/").unwrap().len(), 4);
//! ```
//!
//! ## Fairness
//!
//! The per-node lock prevents starvation of both readers and writers: an
//! arriving reader yields to a waiting writer, and a releasing writer
//! hands the node back to the reader batch first. The drain mode used to
//! quiesce a subtree before removal or relocation is strictly
//! lowest-priority and is granted only when a node has no active or
//! waiting readers or writers at all.
//!
//! ## Blocking
//!
//! Operations block the calling thread on per-node locks; there is no
//! timeout or cancellation. Waits are bounded by the fairness policy, not
//! by a clock.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod path;
pub mod rwlock;
pub mod tree;

mod node;
mod trace;

pub use error::{Result, TreeError};
pub use tree::DirTree;
