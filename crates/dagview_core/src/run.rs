use std::ops::Deref;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Read access to the version markers of a run record.
///
/// Implemented by [`GridRun`] and by any caller record that wants version
/// flags computed over it without conversion.
pub trait Versioned {
    fn bundle_version(&self) -> Option<&str>;
    fn dag_version_number(&self) -> Option<i64>;
}

/// A grid run as delivered by the backend; unknown fields pass through.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridRun {
    #[serde(default)]
    pub bundle_version: Option<String>,
    #[serde(default)]
    pub dag_version_number: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GridRun {
    pub fn new(bundle_version: Option<&str>, dag_version_number: Option<i64>) -> Self {
        Self {
            bundle_version: bundle_version.map(ToOwned::to_owned),
            dag_version_number,
            extra: Map::new(),
        }
    }
}

impl Versioned for GridRun {
    fn bundle_version(&self) -> Option<&str> {
        self.bundle_version.as_deref()
    }

    fn dag_version_number(&self) -> Option<i64> {
        self.dag_version_number
    }
}

/// "This run differs from the one after it."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionFlags {
    pub is_bundle_version_change: bool,
    pub is_dag_version_change: bool,
}

/// A run with its version flags merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flagged<R> {
    #[serde(flatten)]
    pub run: R,
    #[serde(flatten)]
    pub flags: VersionFlags,
}

impl<R> Deref for Flagged<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.run
    }
}
