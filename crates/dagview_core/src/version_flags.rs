use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::run::{Flagged, VersionFlags, Versioned};

/// User preference for which version indicators the grid shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionIndicatorMode {
    All,
    Bundle,
    Dag,
    None,
}

impl VersionIndicatorMode {
    /// An unset preference shows indicators; only an explicit `None` hides them.
    pub fn flags_enabled(mode: Option<Self>) -> bool {
        mode != Some(Self::None)
    }
}

/// Computes per-run version flags by comparing each run with its successor.
///
/// Absent input stays absent. With the policy disabled every run gets
/// `{false, false}` and no comparison is made. A missing value on either
/// side never counts as a change, and the last run has no successor.
pub fn compute<R>(runs: Option<&[R]>, policy_enabled: bool) -> Option<Vec<Flagged<R>>>
where
    R: Versioned + Clone,
{
    let runs = runs?;

    if !policy_enabled {
        return Some(
            runs.iter()
                .map(|run| Flagged {
                    run: run.clone(),
                    flags: VersionFlags::default(),
                })
                .collect(),
        );
    }

    let flagged = runs
        .iter()
        .enumerate()
        .map(|(index, run)| {
            let flags = match runs.get(index + 1) {
                Some(next) => VersionFlags {
                    is_bundle_version_change: differs(
                        run.bundle_version(),
                        next.bundle_version(),
                    ),
                    is_dag_version_change: differs(
                        run.dag_version_number(),
                        next.dag_version_number(),
                    ),
                },
                None => VersionFlags::default(),
            };
            Flagged {
                run: run.clone(),
                flags,
            }
        })
        .collect();

    Some(flagged)
}

fn differs<T: PartialEq>(current: Option<T>, next: Option<T>) -> bool {
    matches!((current, next), (Some(a), Some(b)) if a != b)
}

/// Caches the last [`compute`] result keyed on `(runs, policy_enabled)`.
///
/// Recomputes only when the run list (by identity, then by content) or the
/// policy changes.
#[derive(Debug)]
pub struct VersionFlagMemo<R> {
    key: Option<(Option<Arc<Vec<R>>>, bool)>,
    value: Option<Arc<Vec<Flagged<R>>>>,
    computations: usize,
}

impl<R> Default for VersionFlagMemo<R> {
    fn default() -> Self {
        Self {
            key: None,
            value: None,
            computations: 0,
        }
    }
}

impl<R> VersionFlagMemo<R>
where
    R: Versioned + Clone + PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        runs: Option<&Arc<Vec<R>>>,
        policy_enabled: bool,
    ) -> Option<Arc<Vec<Flagged<R>>>> {
        if let Some((cached_runs, cached_policy)) = &self.key {
            if *cached_policy == policy_enabled && same_runs(cached_runs.as_ref(), runs) {
                return self.value.clone();
            }
        }

        self.computations += 1;
        self.value = compute(runs.map(|r| r.as_slice()), policy_enabled).map(Arc::new);
        self.key = Some((runs.cloned(), policy_enabled));
        self.value.clone()
    }

    /// Number of times the flags were actually recomputed.
    pub fn computations(&self) -> usize {
        self.computations
    }
}

fn same_runs<R: PartialEq>(cached: Option<&Arc<Vec<R>>>, runs: Option<&Arc<Vec<R>>>) -> bool {
    match (cached, runs) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
        _ => false,
    }
}
