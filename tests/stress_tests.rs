//! Stress tests for concurrent directory-tree operations.
//!
//! These push higher thread counts and op volumes than the in-crate
//! concurrency tests, and run with tracing available for diagnosis:
//!
//! ```bash
//! RUST_LOG=dirtree=debug cargo test --test stress_tests --release
//! ```

#![expect(clippy::unwrap_used, reason = "fail fast in tests")]

mod common;

use dirtree::{DirTree, TreeError};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

const HIGH_THREADS: usize = 16;

#[test]
fn stress_fanout_creates_under_shared_parent() {
    common::init_tracing();
    let tree = Arc::new(DirTree::new());
    tree.create("/shared/").unwrap();
    let per_thread = 50;

    let handles: Vec<_> = (0..HIGH_THREADS)
        .map(|id| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                for n in 0..per_thread {
                    tree.create(&format!("/shared/t{id}n{n}/")).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let names = tree.list("/shared/").unwrap();
    assert_eq!(names.len(), HIGH_THREADS * per_thread);
    let unique: BTreeSet<_> = names.iter().collect();
    assert_eq!(unique.len(), names.len(), "duplicate entries: {names:?}");
}

#[test]
fn stress_rename_ping_pong_keeps_single_home() {
    common::init_tracing();
    let tree = Arc::new(DirTree::new());
    tree.create("/ping/").unwrap();
    tree.create("/ping/payload/").unwrap();

    let rounds = 400;
    let flips = Arc::new(AtomicUsize::new(0));

    let paddle = |from: &'static str, to: &'static str| {
        let tree = Arc::clone(&tree);
        let flips = Arc::clone(&flips);
        thread::spawn(move || {
            for _ in 0..rounds {
                match tree.rename(from, to) {
                    Ok(()) => {
                        flips.fetch_add(1, Ordering::SeqCst);
                    }
                    // The other paddle holds the ball right now.
                    Err(TreeError::NotFound | TreeError::AlreadyExists) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }
        })
    };

    let a = paddle("/ping/", "/pong/");
    let b = paddle("/pong/", "/ping/");
    a.join().unwrap();
    b.join().unwrap();

    let root = tree.list("/").unwrap();
    let homes: Vec<_> = root.iter().filter(|n| *n == "ping" || *n == "pong").collect();
    assert_eq!(homes.len(), 1, "ball in {} homes: {root:?}", homes.len());

    let home = format!("/{}/", homes[0]);
    assert_eq!(tree.list(&home).unwrap(), vec!["payload".to_owned()]);
    assert!(flips.load(Ordering::SeqCst) > 0);
}

#[test]
fn stress_readers_through_churning_interior() {
    common::init_tracing();
    let tree = Arc::new(DirTree::new());
    tree.create("/stable/").unwrap();
    tree.create("/stable/mid/").unwrap();
    tree.create("/churn/").unwrap();

    let writer_rounds = 400;
    let done = Arc::new(AtomicUsize::new(0));

    let writers: Vec<_> = (0..4)
        .map(|id| {
            let tree = Arc::clone(&tree);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for n in 0..writer_rounds {
                    let dir = format!("/churn/w{id}n{n}/");
                    let dst = format!("/stable/mid/w{id}n{n}/");
                    tree.create(&dir).unwrap();
                    tree.rename(&dir, &dst).unwrap();
                    tree.remove(&dst).unwrap();
                }
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let tree = Arc::clone(&tree);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut snapshots = 0usize;
                while done.load(Ordering::SeqCst) < 4 {
                    let names = tree.list("/stable/").unwrap();
                    assert!(names.contains(&"mid".to_owned()));
                    tree.list("/stable/mid/").unwrap();
                    snapshots += 1;
                }
                snapshots
            })
        })
        .collect();

    for h in writers {
        h.join().unwrap();
    }
    for h in readers {
        assert!(h.join().unwrap() > 0);
    }

    assert_eq!(tree.list("/churn/"), Ok(vec![]));
    assert_eq!(tree.list("/stable/mid/"), Ok(vec![]));
}

#[test]
fn stress_deep_chain_build_and_teardown() {
    common::init_tracing();
    let tree = Arc::new(DirTree::new());

    // Build a 32-deep chain, then tear it down leaf-first while listers
    // keep walking whatever remains.
    let depth = 32;
    let mut chain = Vec::with_capacity(depth);
    let mut p = String::from("/");
    for _ in 0..depth {
        p.push_str("n/");
        chain.push(p.clone());
        tree.create(&p).unwrap();
    }

    let teardown = {
        let tree = Arc::clone(&tree);
        let chain = chain.clone();
        thread::spawn(move || {
            for dir in chain.iter().rev() {
                tree.remove(dir).unwrap();
            }
        })
    };

    let walkers: Vec<_> = (0..3)
        .map(|_| {
            let tree = Arc::clone(&tree);
            let deepest = chain[depth - 1].clone();
            thread::spawn(move || {
                loop {
                    match tree.list(&deepest) {
                        // Chain intact up to the leaf.
                        Ok(names) => assert!(names.is_empty()),
                        // Teardown got there first.
                        Err(TreeError::NotFound) => break,
                        Err(other) => panic!("unexpected error: {other:?}"),
                    }
                }
            })
        })
        .collect();

    teardown.join().unwrap();
    for h in walkers {
        h.join().unwrap();
    }
    assert_eq!(tree.list("/"), Ok(vec![]));
}
