//! Strata Runtime - join-result assembly
//!
//! Given the per-stream candidate events produced by index lookups for one
//! triggering event (or batch), this crate rebuilds the multi-stream join
//! rows, including outer-join rows with null slots, without materializing a
//! full cross product.
//!
//! ```
//! use std::sync::Arc;
//! use strata_core::JoinTree;
//! use strata_runtime::{AssemblyDriver, MatchRef, MatchSets};
//!
//! // R joins A (inner), A joins B (outer)
//! let tree = Arc::new(
//!     JoinTree::builder(3).root(0).required(1, 0).optional(2, 1).build().unwrap(),
//! );
//! let mut driver = AssemblyDriver::new(tree);
//!
//! let mut matches = MatchSets::with_root(3, 0, ["R"]);
//! matches.add(1, MatchRef::new(0, 0), "R", ["a1", "a2"]);
//!
//! let rows = driver.run_pass(&matches).unwrap();
//! let rendered: Vec<String> = rows.iter().map(|row| row.to_string()).collect();
//! assert_eq!(rendered, ["[R, a1, null]", "[R, a2, null]"]);
//! ```

pub mod assembly;
pub mod driver;
pub mod error;
pub mod event;
pub mod matches;
pub mod options;
pub mod partition;
pub mod row;

pub use assembly::{AssemblyNode, NodeKind};
pub use driver::AssemblyDriver;
pub use error::{AssemblyError, AssemblyResult};
pub use event::EventRef;
pub use matches::{FxIndexSet, MatchNode, MatchRef, MatchSets};
pub use options::AssemblyOptions;
pub use partition::PartitionedAssembly;
pub use row::{ResultCollection, ResultRow};
