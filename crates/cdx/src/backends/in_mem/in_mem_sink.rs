use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::backends::Sink;
use crate::event::CollisionEvent;

/// 📦 A sink that keeps everything in a map and calls it a database.
///
/// `InMemorySink` receives event batches and files them in a shared
/// `BTreeMap` keyed by event id. The map IS the primary key: inserting an
/// id that's already present changes nothing, which is exactly the
/// `ON CONFLICT DO NOTHING` contract the Postgres sink honours — same
/// rules, no elephant.
///
/// 🧠 Knowledge graph: this is the test double AND the contract oracle.
/// `rows` answers "what's in the database", `commits` answers "how many
/// transactions of what size happened", and `poisoned` lets a test make
/// every commit fail so the rejected-insert accounting can be audited.
///
/// Clone-able because tests need a handle to keep after giving one to the
/// pipeline — every clone shares the same `Arc`'d state, so the handle the
/// test kept sees every row the workers wrote.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    /// 🔒 Every unique event this sink ever accepted, keyed by id.
    pub(crate) rows: Arc<tokio::sync::Mutex<BTreeMap<Uuid, CollisionEvent>>>,
    /// 🧾 Commit log: the length of every batch that committed successfully.
    /// Residual-flush and batch-boundary tests read this like tea leaves.
    pub(crate) commits: Arc<tokio::sync::Mutex<Vec<usize>>>,
    /// ☠️ Poison switch — flip it and every commit fails, so tests can watch
    /// the pipeline count its losses instead of hiding them.
    poisoned: Arc<AtomicBool>,
}

impl InMemorySink {
    /// 🚀 A fresh sink: empty map, empty commit log, poison not included.
    ///
    /// Async and `Result`-shaped to match its siblings: the Postgres
    /// constructor genuinely can fail, and the enum dispatch likes symmetry.
    pub(crate) async fn new() -> Result<Self> {
        // -- ✅ nothing to allocate yet but optimism
        Ok(Self::default())
    }

    /// ☠️ Make every subsequent commit fail. Tests only — there is no
    /// antidote method on purpose, a poisoned run stays poisoned.
    pub(crate) fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Sink for InMemorySink {
    /// 📡 "Commit" a batch: one lock, one pass, one entry in the commit log. 🦆
    ///
    /// All-or-nothing, same as the SQL version: the poison check happens
    /// before any row lands, so a failed commit leaves the map untouched.
    async fn insert_batch(&self, events: &[CollisionEvent]) -> Result<u64> {
        if self.poisoned.load(Ordering::SeqCst) {
            // -- ☠️ the designated disaster. every row in this batch is now
            // -- someone's rejected_insert statistic.
            anyhow::bail!("in-memory sink is poisoned — commit refused");
        }

        // 🔒 one lock over rows makes dup-check plus insert a single atomic step
        let mut rows = self.rows.lock().await;
        let mut inserted = 0u64;
        for event in events {
            // 🎯 duplicate id = no-op. The map shrugs, the contract smiles.
            if let std::collections::btree_map::Entry::Vacant(slot) = rows.entry(event.id) {
                slot.insert(*event);
                inserted += 1;
            }
        }
        self.commits.lock().await.push(events.len());
        Ok(inserted)
    }

    /// 🗑️ Nothing to release: no sockets, no file handles, just ref-counts
    /// that already know how to count themselves down. The method exists
    /// because the contract says goodbyes are mandatory, even in RAM.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
