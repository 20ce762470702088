//! Stress driver for concurrent directory-tree workloads.
//!
//! Diagnoses hangs and unfair scheduling under mixed list/create/remove/
//! rename load.
//!
//! Run with:
//! ```bash
//! RUST_LOG=dirtree=debug cargo run --release --features tracing
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_precision_loss)]

use dirtree::DirTree;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

const THREADS: usize = 8;
const ROUNDS: usize = 5_000;

fn main() {
    let tree = Arc::new(DirTree::new());
    tree.create("/work/").unwrap();
    tree.create("/archive/").unwrap();

    let ops = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let handles: Vec<_> = (0..THREADS)
        .map(|id| {
            let tree = Arc::clone(&tree);
            let ops = Arc::clone(&ops);
            thread::spawn(move || {
                for round in 0..ROUNDS {
                    let dir = format!("/work/t{id}r{round}/");
                    let moved = format!("/archive/t{id}r{round}/");

                    tree.create(&dir).unwrap();
                    tree.list("/work/").unwrap();
                    tree.rename(&dir, &moved).unwrap();
                    tree.remove(&moved).unwrap();
                    ops.fetch_add(4, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().expect("worker panicked");
    }

    let elapsed = started.elapsed();
    let total = ops.load(Ordering::Relaxed);
    println!(
        "{total} ops across {THREADS} threads in {elapsed:?} ({:.0} ops/s)",
        total as f64 / elapsed.as_secs_f64()
    );

    assert!(tree.list("/work/").unwrap().is_empty());
    assert!(tree.list("/archive/").unwrap().is_empty());
    println!("final tree consistent");
}
