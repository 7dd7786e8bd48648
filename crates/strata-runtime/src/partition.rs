//! Per-partition assembly
//!
//! Context partitioning gives every partition key its own query state. Each
//! partition gets an independent [`AssemblyDriver`] over the shared join
//! tree. Passes of different partitions may run concurrently; passes of the
//! same partition are serialized by the partition's lock, since the driver's
//! node state is reused from pass to pass.

use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rustc_hash::FxHashMap;
use strata_core::JoinTree;
use tracing::{debug, warn};

use crate::driver::AssemblyDriver;
use crate::error::AssemblyResult;
use crate::matches::MatchSets;
use crate::options::AssemblyOptions;
use crate::row::ResultCollection;

type SharedDriver<E> = Arc<Mutex<AssemblyDriver<E>>>;

pub struct PartitionedAssembly<K, E> {
    tree: Arc<JoinTree>,
    options: AssemblyOptions,
    partitions: RwLock<FxHashMap<K, SharedDriver<E>>>,
}

impl<K, E> PartitionedAssembly<K, E>
where
    K: Clone + Eq + Hash,
    E: Clone + Eq + Hash,
{
    pub fn new(tree: Arc<JoinTree>) -> Self {
        Self::with_options(tree, AssemblyOptions::default())
    }

    pub fn with_options(tree: Arc<JoinTree>, options: AssemblyOptions) -> Self {
        Self {
            tree,
            options,
            partitions: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn tree(&self) -> &Arc<JoinTree> {
        &self.tree
    }

    /// Run one pass for the partition `key`, creating its driver on first use
    pub fn run_pass(&self, key: &K, matches: &MatchSets<E>) -> AssemblyResult<ResultCollection<E>> {
        let driver = self.driver(key);
        let mut guard = lock(&driver);
        guard.run_pass(matches)
    }

    /// Tear down a partition. Returns whether it existed.
    pub fn remove(&self, key: &K) -> bool {
        let removed = self
            .partitions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key)
            .is_some();
        if removed {
            debug!("Assembly partition removed, {} remaining", self.len());
        }
        removed
    }

    pub fn contains(&self, key: &K) -> bool {
        self.partitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.partitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed passes of a partition, if it exists
    pub fn passes(&self, key: &K) -> Option<u64> {
        let driver = self
            .partitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()?;
        let passes = lock(&driver).passes();
        Some(passes)
    }

    fn driver(&self, key: &K) -> SharedDriver<E> {
        if let Some(driver) = self
            .partitions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return Arc::clone(driver);
        }

        let mut partitions = self.partitions.write().unwrap_or_else(|e| e.into_inner());
        let driver = partitions.entry(key.clone()).or_insert_with(|| {
            debug!("Assembly partition created");
            Arc::new(Mutex::new(AssemblyDriver::with_options(
                Arc::clone(&self.tree),
                self.options.clone(),
            )))
        });
        Arc::clone(driver)
    }
}

/// Lock a partition driver.
///
/// A pass that panicked leaves only transient node state behind, and every
/// pass starts by resetting it, so a poisoned driver is still usable.
fn lock<E>(driver: &Mutex<AssemblyDriver<E>>) -> MutexGuard<'_, AssemblyDriver<E>> {
    driver.lock().unwrap_or_else(|e| {
        warn!("Assembly partition lock was poisoned, reusing driver");
        e.into_inner()
    })
}
