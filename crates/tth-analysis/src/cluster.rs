//! Violation clustering
//!
//! Groups a context's violations by root cause. Clusters are append-only and
//! keep insertion order; a new violation joins the oldest cluster whose first
//! member shares its root cause.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use tth_security::ViolationCategory;
use uuid::Uuid;

use crate::root_cause::{root_cause_text, same_root_cause};
use crate::violation::Violation;

/// Identifies an isolated analysis scope, one per browser tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Repeated occurrences of one defect. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    pub root_cause: String,
    pub count: usize,
    pub first_occurrence: u64,
    pub last_occurrence: u64,
    pub members: Vec<Violation>,
}

impl Cluster {
    fn new(id: String, violation: Violation) -> Self {
        Self {
            id,
            root_cause: root_cause_text(&violation.stack_trace),
            count: 1,
            first_occurrence: violation.observed_at,
            last_occurrence: violation.observed_at,
            members: vec![violation],
        }
    }

    /// The earliest member, used as the cluster's representative.
    pub fn representative(&self) -> &Violation {
        &self.members[0]
    }

    fn accepts(&self, violation: &Violation) -> bool {
        same_root_cause(self.representative(), violation)
    }

    fn push(&mut self, violation: Violation) {
        self.root_cause = root_cause_text(&violation.stack_trace);
        self.last_occurrence = violation.observed_at;
        self.members.push(violation);
        self.count += 1;
    }
}

/// One context's clusters plus the order their members arrived in
#[derive(Debug, Default)]
struct ContextClusters {
    clusters: Vec<Cluster>,
    /// `(cluster index, member index)` per ingested violation
    arrivals: Vec<(usize, usize)>,
}

/// Per-context cluster lists, owned by the caller
#[derive(Debug, Default)]
pub struct ClusterStore {
    contexts: HashMap<ContextId, ContextClusters>,
    next_id: u64,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a violation to the first matching cluster, or start a new one.
    pub fn ingest(&mut self, context: ContextId, violation: Violation) -> &Cluster {
        let state = self.contexts.entry(context).or_default();

        if let Some(index) = state.clusters.iter().position(|cluster| cluster.accepts(&violation)) {
            let cluster = &mut state.clusters[index];
            cluster.push(violation);
            state.arrivals.push((index, cluster.members.len() - 1));
            tracing::debug!(
                "Context {}: cluster {} now has {} violations",
                context, cluster.id, cluster.count
            );
            return cluster;
        }

        let id = format!("{}-{}", self.next_id, Uuid::new_v4().simple());
        self.next_id += 1;

        let cluster = Cluster::new(id, violation);
        tracing::debug!(
            "Context {}: new cluster {} for {}",
            context, cluster.id, cluster.root_cause
        );
        state.arrivals.push((state.clusters.len(), 0));
        state.clusters.push(cluster);
        &state.clusters[state.clusters.len() - 1]
    }

    /// Clusters of a context in creation order.
    pub fn list_by_cluster(&self, context: ContextId) -> &[Cluster] {
        self.contexts
            .get(&context)
            .map(|state| state.clusters.as_slice())
            .unwrap_or(&[])
    }

    /// Every member of a context, bucketed by category in arrival order.
    ///
    /// All categories are present; violations with an unrecognized category
    /// are left out.
    pub fn list_by_category(&self, context: ContextId) -> BTreeMap<ViolationCategory, Vec<&Violation>> {
        let mut buckets: BTreeMap<ViolationCategory, Vec<&Violation>> =
            ViolationCategory::ALL.iter().map(|category| (*category, Vec::new())).collect();

        let Some(state) = self.contexts.get(&context) else {
            return buckets;
        };
        for &(cluster, member) in &state.arrivals {
            let violation = &state.clusters[cluster].members[member];
            if let Some(category) = violation.category {
                buckets.entry(category).or_default().push(violation);
            }
        }
        buckets
    }

    /// Forget all clusters of a context.
    pub fn clear(&mut self, context: ContextId) {
        self.contexts.remove(&context);
    }

    /// Number of contexts holding violations
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }
}
