//! # Strata Core
//!
//! Compile-time join model for the Strata continuous-query engine.
//!
//! A multi-stream join statement is described by a [`JoinTree`]: one node per
//! stream, each tagged *required* (inner join) or *optional* (outer join)
//! relative to its parent, rooted at the anchor stream whose events trigger
//! evaluation. The tree is validated once when the statement is compiled and
//! is shared read-only by every assembly instance of that statement.
//!
//! ## Modules
//!
//! - [`tree`]: the validated join tree and its builder
//! - [`decl`]: name-based stream declarations, deserializable from config files
//! - [`error`]: configuration errors for malformed trees
//!
//! ## Quick Start
//!
//! ```
//! use strata_core::JoinTree;
//!
//! // R is the root, A is inner-joined to R, B is outer-joined to A
//! let tree = JoinTree::builder(3)
//!     .root(0)
//!     .required(1, 0)
//!     .optional(2, 1)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(tree.root(), 0);
//! assert_eq!(tree.parent_of(2), Some(1));
//! assert!(tree.is_optional(2));
//! assert_eq!(tree.postorder(), &[2, 1, 0]);
//! ```

pub mod decl;
pub mod error;
pub mod tree;

pub use decl::StreamDecl;
pub use error::JoinTreeError;
pub use tree::{JoinTree, JoinTreeBuilder, JoinTreeNode, StreamIndex};
