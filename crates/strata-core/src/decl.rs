//! Name-based stream declarations
//!
//! Query compilation hands the join layout over as a flat list of streams
//! naming their parents. Stream indices follow declaration order.
//!
//! ```yaml
//! streams:
//!   - name: Orders
//!   - name: Payments
//!     parent: Orders
//!   - name: Refunds
//!     parent: Payments
//!     optional: true
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{JoinTreeError, JoinTreeResult};
use crate::tree::{JoinTree, StreamIndex};

/// Declaration of one stream of a join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDecl {
    pub name: String,
    /// Name of the parent stream; absent for the root
    #[serde(default)]
    pub parent: Option<String>,
    /// Outer-joined to the parent
    #[serde(default)]
    pub optional: bool,
}

impl StreamDecl {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            optional: false,
        }
    }

    pub fn required(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            optional: true,
        }
    }
}

impl JoinTree {
    /// Build a tree from name-based declarations.
    ///
    /// The i-th declaration becomes stream `i`.
    pub fn from_decls(decls: &[StreamDecl]) -> JoinTreeResult<JoinTree> {
        let mut indices: HashMap<&str, StreamIndex> = HashMap::with_capacity(decls.len());
        for (stream, decl) in decls.iter().enumerate() {
            if indices.insert(decl.name.as_str(), stream).is_some() {
                return Err(JoinTreeError::DuplicateStreamName(decl.name.clone()));
            }
        }

        let mut builder = JoinTree::builder(decls.len());
        for (stream, decl) in decls.iter().enumerate() {
            let parent = match &decl.parent {
                Some(name) => Some(
                    *indices
                        .get(name.as_str())
                        .ok_or_else(|| JoinTreeError::UnknownStreamName(name.clone()))?,
                ),
                None => None,
            };
            builder = builder
                .declare(stream, parent, decl.optional)
                .name(stream, decl.name.clone());
        }
        builder.build()
    }
}
