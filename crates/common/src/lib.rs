//! Identifiers, a small `Map` alias, the workload `Mix`, and the `Executor`
//! fan-out switch shared across every advisor crate.

use ahash::RandomState;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Hasher-pinned map alias used for every name/id lookup in the advisor,
/// matching a catalog's typical name/id lookup-table pattern.
pub type Map<K, V> = HashMap<K, V, RandomState>;

/// Identifies a single parsed statement within a workload.
///
/// Examples:
/// - `let q = StatementId(0); // first statement in the workload`
/// - `let u = StatementId(12);`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StatementId(pub u32);

/// Stable identifier for an `Index`, hashed from its
/// `(hash, order, extra, path)` tuple so two structurally equal indexes
/// compare equal (`spec.md §3`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexKey(pub u64);

/// A named weighting of statement frequencies within a workload (`spec.md`
/// glossary: "Mix").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mix {
    pub name: String,
    /// Explicit statement-id -> weight overrides. Statements absent from
    /// this map fall back to a uniform share of the remaining weight
    /// (`spec.md §9` Open Question 3).
    pub weights: Map<StatementId, f64>,
}

impl Mix {
    pub fn uniform(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weights: Map::default(),
        }
    }

    /// Resolve the frequency of `statement` within a workload of
    /// `statement_count` total statements, applying the uniform-default rule.
    pub fn frequency(&self, statement: StatementId, statement_count: usize) -> f64 {
        self.weights.get(&statement).copied().unwrap_or_else(|| {
            if statement_count == 0 {
                0.0
            } else {
                1.0 / statement_count as f64
            }
        })
    }
}

/// Data-parallelism switch threaded explicitly from the search driver,
/// replacing a process-wide parallelism toggle (`spec.md §9`, `§5`:
/// "opportunistic data-parallelism over independent statements").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Executor {
    /// Deterministic, single-threaded iteration order. Useful for tests and
    /// for reproducing a result bit-for-bit.
    #[default]
    Sequential,
    /// Fan out across a `rayon` thread pool.
    Rayon,
}

impl Executor {
    /// Map `f` over `items`, honoring the chosen fan-out strategy. `f` must
    /// be safe to run concurrently when `Executor::Rayon` is selected.
    pub fn map<T, R, F>(self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        match self {
            Executor::Sequential => items.iter().map(|item| f(item)).collect(),
            Executor::Rayon => {
                use rayon::prelude::*;
                items.par_iter().map(|item| f(item)).collect()
            }
        }
    }
}
