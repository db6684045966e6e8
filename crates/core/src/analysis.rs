//! Analysis-situation snapshots.
//!
//! The service periodically pushes the current state of the analytical
//! query under construction. A snapshot is only meaningful once a cube has
//! been selected; payloads without a `cube` field are rejected as
//! malformed. Everything besides the cube is kept loosely, since the
//! shape of the remaining slots evolves with the service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSituation {
    /// The selected cube. Required; its inner shape is service-defined.
    pub cube: Value,

    /// All remaining slots of the snapshot (measures, filters,
    /// granularity levels, ...), untyped.
    #[serde(flatten)]
    pub slots: Map<String, Value>,
}

impl AnalysisSituation {
    /// The cube's display name, when the service provides one.
    pub fn cube_label(&self) -> Option<&str> {
        self.cube
            .get("label")
            .and_then(Value::as_str)
            .or_else(|| self.cube.as_str())
    }
}
