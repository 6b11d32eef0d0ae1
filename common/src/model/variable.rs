use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace assigned to tokens whose path has no `.` separator.
pub const GENERAL_NAMESPACE: &str = "general";

/// Result of matching a rendered document against a candidate data object.
///
/// Derived entirely from the (document, data) pair; it has no persisted identity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariableBinding {
    /// Unique token paths in discovery order.
    pub tokens: Vec<String>,
    /// Tokens grouped by their first path segment.
    pub groups: BTreeMap<String, Vec<String>>,
    /// Tokens the data object does not satisfy.
    pub missing: Vec<String>,
}

impl VariableBinding {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}
