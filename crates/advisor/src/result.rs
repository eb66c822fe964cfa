use common::{Map, StatementId};
use costplan::Plan;
use enumerator::EnumerationReport;
use index::Index;
use serde::{Deserialize, Serialize};

/// Everything the search driver produces for one run (`spec.md §4.7`):
/// chosen indexes, per-statement plan, total size, total cost, and the
/// enumeration diagnostics (`§9` supplement) the driver logs alongside it.
/// Round-trips through JSON bit-for-bit (`spec.md §8`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub chosen_indexes: Vec<Index>,
    pub statement_plans: Map<StatementId, Plan>,
    pub total_size: f64,
    pub total_cost: f64,
    pub enumeration: EnumerationReport,
}
