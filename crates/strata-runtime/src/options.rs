//! Assembly tuning options
//!
//! Loaded from the `assembly` section of a configuration file:
//!
//! ```yaml
//! assembly:
//!   single_result_fast_path: true
//!   row_capacity: 16
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    /// Let outer-join branches with exactly one matched event skip the
    /// completed-event bookkeeping. Output is the same either way.
    pub single_result_fast_path: bool,

    /// Initial capacity of the result collection created by `run_pass`
    pub row_capacity: usize,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            single_result_fast_path: true,
            row_capacity: 16,
        }
    }
}

impl AssemblyOptions {
    pub fn with_fast_path(mut self, enabled: bool) -> Self {
        self.single_result_fast_path = enabled;
        self
    }

    pub fn with_row_capacity(mut self, capacity: usize) -> Self {
        self.row_capacity = capacity;
        self
    }
}
