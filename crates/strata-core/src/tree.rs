//! Join tree model
//!
//! The join tree is the compile-time shape of a multi-stream join. Every
//! stream appears exactly once; every stream but the root has one parent and
//! is either required (inner join) or optional (outer join) relative to it.
//!
//! Traversal orders are computed once in [`JoinTreeBuilder::build`] so that
//! evaluation never walks the tree recursively.

use std::fmt;

use crate::error::{JoinTreeError, JoinTreeResult};

/// Index of a stream within a join statement, `0..num_streams`.
///
/// The same index addresses the stream's slot in a result row and its
/// assembly node.
pub type StreamIndex = usize;

/// One stream of the join tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTreeNode {
    pub stream: StreamIndex,
    /// Parent stream, `None` for the root
    pub parent: Option<StreamIndex>,
    /// Outer-joined to its parent
    pub optional: bool,
    /// Child streams in ascending stream order
    pub children: Vec<StreamIndex>,
    pub name: Option<String>,
}

impl JoinTreeNode {
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A validated, immutable join tree.
///
/// Built once per statement through [`JoinTree::builder`] or
/// [`JoinTree::from_decls`], then shared read-only (typically in an `Arc`) by
/// every assembly instance of the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTree {
    nodes: Vec<JoinTreeNode>,
    root: StreamIndex,
    preorder: Vec<StreamIndex>,
    postorder: Vec<StreamIndex>,
    /// All streams in each node's subtree, the node itself first
    substreams: Vec<Vec<StreamIndex>>,
}

impl JoinTree {
    /// Start declaring a tree over `num_streams` streams
    pub fn builder(num_streams: usize) -> JoinTreeBuilder {
        JoinTreeBuilder::new(num_streams)
    }

    #[inline]
    pub fn num_streams(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn root(&self) -> StreamIndex {
        self.root
    }

    /// Node descriptor for a stream.
    ///
    /// # Panics
    /// Panics if `stream` is out of range.
    #[inline]
    pub fn node(&self, stream: StreamIndex) -> &JoinTreeNode {
        &self.nodes[stream]
    }

    pub fn nodes(&self) -> &[JoinTreeNode] {
        &self.nodes
    }

    #[inline]
    pub fn parent_of(&self, stream: StreamIndex) -> Option<StreamIndex> {
        self.nodes[stream].parent
    }

    #[inline]
    pub fn is_optional(&self, stream: StreamIndex) -> bool {
        self.nodes[stream].optional
    }

    #[inline]
    pub fn children(&self, stream: StreamIndex) -> &[StreamIndex] {
        &self.nodes[stream].children
    }

    /// Streams in the subtree rooted at `stream`, `stream` itself first
    #[inline]
    pub fn substreams(&self, stream: StreamIndex) -> &[StreamIndex] {
        &self.substreams[stream]
    }

    pub fn name(&self, stream: StreamIndex) -> Option<&str> {
        self.nodes[stream].name.as_deref()
    }

    /// Name of the stream, or `#<index>` when it has none
    pub fn label(&self, stream: StreamIndex) -> String {
        match self.name(stream) {
            Some(name) => name.to_string(),
            None => format!("#{}", stream),
        }
    }

    /// Look up a stream by name
    pub fn stream_named(&self, name: &str) -> Option<StreamIndex> {
        self.nodes
            .iter()
            .find(|n| n.name.as_deref() == Some(name))
            .map(|n| n.stream)
    }

    /// Streams with parents before children, siblings in ascending order
    pub fn preorder(&self) -> &[StreamIndex] {
        &self.preorder
    }

    /// Streams with children before parents, the root last
    pub fn postorder(&self) -> &[StreamIndex] {
        &self.postorder
    }

    /// Visit every node children-first
    pub fn for_each_postorder<F>(&self, mut f: F)
    where
        F: FnMut(&JoinTreeNode),
    {
        for &stream in &self.postorder {
            f(&self.nodes[stream]);
        }
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, stream: StreamIndex, depth: usize) -> fmt::Result {
        let node = &self.nodes[stream];
        let role = match (node.parent, node.optional) {
            (None, _) => "root",
            (Some(_), false) => "required",
            (Some(_), true) => "optional",
        };
        writeln!(
            f,
            "{:indent$}{} stream={} {}",
            "",
            self.label(stream),
            stream,
            role,
            indent = depth * 2
        )?;
        for &child in &node.children {
            self.fmt_node(f, child, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for JoinTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, 0)
    }
}

#[derive(Debug, Clone, Copy)]
struct Declared {
    parent: Option<StreamIndex>,
    optional: bool,
}

/// Collects stream declarations and validates them into a [`JoinTree`].
///
/// Declaration mistakes (out-of-range or duplicate streams) are recorded and
/// reported by [`build`](Self::build), so declarations can be chained.
#[derive(Debug, Clone)]
pub struct JoinTreeBuilder {
    declared: Vec<Option<Declared>>,
    names: Vec<Option<String>>,
    errors: Vec<JoinTreeError>,
}

impl JoinTreeBuilder {
    pub fn new(num_streams: usize) -> Self {
        Self {
            declared: vec![None; num_streams],
            names: vec![None; num_streams],
            errors: Vec::new(),
        }
    }

    /// Declare the anchor stream
    pub fn root(self, stream: StreamIndex) -> Self {
        self.declare(stream, None, false)
    }

    /// Declare a stream inner-joined to `parent`
    pub fn required(self, stream: StreamIndex, parent: StreamIndex) -> Self {
        self.declare(stream, Some(parent), false)
    }

    /// Declare a stream outer-joined to `parent`
    pub fn optional(self, stream: StreamIndex, parent: StreamIndex) -> Self {
        self.declare(stream, Some(parent), true)
    }

    /// Declare a stream with an explicit role
    pub fn declare(
        mut self,
        stream: StreamIndex,
        parent: Option<StreamIndex>,
        optional: bool,
    ) -> Self {
        match self.declared.get_mut(stream) {
            None => self.errors.push(JoinTreeError::StreamOutOfRange {
                stream,
                num_streams: self.names.len(),
            }),
            Some(Some(_)) => self.errors.push(JoinTreeError::DuplicateStream(stream)),
            Some(slot) => *slot = Some(Declared { parent, optional }),
        }
        self
    }

    /// Attach a display name to a stream
    pub fn name(mut self, stream: StreamIndex, name: impl Into<String>) -> Self {
        let num_streams = self.names.len();
        match self.names.get_mut(stream) {
            Some(slot) => *slot = Some(name.into()),
            None => self.errors.push(JoinTreeError::StreamOutOfRange {
                stream,
                num_streams,
            }),
        }
        self
    }

    /// Validate the declarations and compute traversal orders
    pub fn build(self) -> JoinTreeResult<JoinTree> {
        let num_streams = self.declared.len();
        if num_streams == 0 {
            return Err(JoinTreeError::EmptyTree);
        }
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        let mut decls = Vec::with_capacity(num_streams);
        for (stream, decl) in self.declared.into_iter().enumerate() {
            decls.push(decl.ok_or(JoinTreeError::UndeclaredStream(stream))?);
        }

        let mut root = None;
        for (stream, decl) in decls.iter().enumerate() {
            match decl.parent {
                None => match root {
                    None => root = Some(stream),
                    Some(first) => {
                        return Err(JoinTreeError::MultipleRoots {
                            first,
                            second: stream,
                        })
                    }
                },
                Some(parent) if parent >= num_streams => {
                    return Err(JoinTreeError::UnknownParent { stream, parent })
                }
                Some(parent) if parent == stream => return Err(JoinTreeError::Cycle(stream)),
                Some(_) => {}
            }
        }
        let root = root.ok_or(JoinTreeError::NoRoot)?;
        if decls[root].optional {
            return Err(JoinTreeError::OptionalRoot(root));
        }

        let mut children = vec![Vec::new(); num_streams];
        for (stream, decl) in decls.iter().enumerate() {
            if let Some(parent) = decl.parent {
                children[parent].push(stream);
            }
        }

        // Every stream has one parent, so anything the walk from the root
        // misses hangs off a cycle.
        let mut preorder = Vec::with_capacity(num_streams);
        let mut stack = vec![root];
        while let Some(stream) = stack.pop() {
            preorder.push(stream);
            stack.extend(children[stream].iter().rev());
        }
        if preorder.len() < num_streams {
            let mut reached = vec![false; num_streams];
            for &stream in &preorder {
                reached[stream] = true;
            }
            let stream = reached.iter().position(|r| !r).unwrap_or(root);
            return Err(JoinTreeError::Cycle(stream));
        }

        let mut postorder = Vec::with_capacity(num_streams);
        let mut walk: Vec<(StreamIndex, usize)> = vec![(root, 0)];
        while let Some(top) = walk.last_mut() {
            let (stream, next) = *top;
            if next < children[stream].len() {
                top.1 += 1;
                walk.push((children[stream][next], 0));
            } else {
                postorder.push(stream);
                walk.pop();
            }
        }

        let mut substreams: Vec<Vec<StreamIndex>> = vec![Vec::new(); num_streams];
        for &stream in &postorder {
            let mut subtree = vec![stream];
            for &child in &children[stream] {
                subtree.extend_from_slice(&substreams[child]);
            }
            substreams[stream] = subtree;
        }

        let nodes = decls
            .into_iter()
            .zip(children)
            .zip(self.names)
            .enumerate()
            .map(|(stream, ((decl, children), name))| JoinTreeNode {
                stream,
                parent: decl.parent,
                optional: decl.optional,
                children,
                name,
            })
            .collect();

        Ok(JoinTree {
            nodes,
            root,
            preorder,
            postorder,
            substreams,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diamond_free_tree() -> JoinTree {
        // 0 -> {1, 2}, 2 -> {3}
        JoinTree::builder(4)
            .root(0)
            .required(1, 0)
            .optional(2, 0)
            .required(3, 2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_traversal_orders() {
        let tree = diamond_free_tree();
        assert_eq!(tree.root(), 0);
        assert_eq!(tree.preorder(), &[0, 1, 2, 3]);
        assert_eq!(tree.postorder(), &[1, 3, 2, 0]);
    }

    #[test]
    fn test_children_and_parents() {
        let tree = diamond_free_tree();
        assert_eq!(tree.children(0), &[1, 2]);
        assert_eq!(tree.children(2), &[3]);
        assert!(tree.children(3).is_empty());
        assert_eq!(tree.parent_of(0), None);
        assert_eq!(tree.parent_of(3), Some(2));
        assert!(tree.node(0).is_root());
        assert!(tree.node(1).is_leaf());
    }

    #[test]
    fn test_optional_flags() {
        let tree = diamond_free_tree();
        assert!(!tree.is_optional(0));
        assert!(!tree.is_optional(1));
        assert!(tree.is_optional(2));
        assert!(!tree.is_optional(3));
    }

    #[test]
    fn test_substreams() {
        let tree = diamond_free_tree();
        assert_eq!(tree.substreams(0), &[0, 1, 2, 3]);
        assert_eq!(tree.substreams(2), &[2, 3]);
        assert_eq!(tree.substreams(1), &[1]);
    }

    #[test]
    fn test_for_each_postorder_visits_children_first() {
        let tree = diamond_free_tree();
        let mut seen = Vec::new();
        tree.for_each_postorder(|node| {
            for child in &node.children {
                assert!(seen.contains(child));
            }
            seen.push(node.stream);
        });
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_root_need_not_be_stream_zero() {
        let tree = JoinTree::builder(3)
            .required(0, 2)
            .root(2)
            .optional(1, 2)
            .build()
            .unwrap();
        assert_eq!(tree.root(), 2);
        assert_eq!(tree.postorder(), &[0, 1, 2]);
    }

    #[test]
    fn test_single_stream_tree() {
        let tree = JoinTree::builder(1).root(0).build().unwrap();
        assert_eq!(tree.postorder(), &[0]);
        assert_eq!(tree.substreams(0), &[0]);
    }

    #[test]
    fn test_labels_and_lookup() {
        let tree = JoinTree::builder(2)
            .root(0)
            .optional(1, 0)
            .name(0, "Orders")
            .build()
            .unwrap();
        assert_eq!(tree.label(0), "Orders");
        assert_eq!(tree.label(1), "#1");
        assert_eq!(tree.stream_named("Orders"), Some(0));
        assert_eq!(tree.stream_named("Missing"), None);
    }

    #[test]
    fn test_display_indents_children() {
        let tree = JoinTree::builder(3)
            .root(0)
            .required(1, 0)
            .optional(2, 1)
            .name(0, "R")
            .name(1, "A")
            .name(2, "B")
            .build()
            .unwrap();
        let rendered = tree.to_string();
        assert_eq!(
            rendered,
            "R stream=0 root\n  A stream=1 required\n    B stream=2 optional\n"
        );
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert_eq!(
            JoinTree::builder(0).build().unwrap_err(),
            JoinTreeError::EmptyTree
        );
    }

    #[test]
    fn test_out_of_range_stream_rejected() {
        let err = JoinTree::builder(2).root(0).required(5, 0).build().unwrap_err();
        assert_eq!(
            err,
            JoinTreeError::StreamOutOfRange {
                stream: 5,
                num_streams: 2
            }
        );
    }

    #[test]
    fn test_duplicate_stream_rejected() {
        let err = JoinTree::builder(2)
            .root(0)
            .required(1, 0)
            .optional(1, 0)
            .build()
            .unwrap_err();
        assert_eq!(err, JoinTreeError::DuplicateStream(1));
    }

    #[test]
    fn test_undeclared_stream_rejected() {
        let err = JoinTree::builder(3).root(0).required(1, 0).build().unwrap_err();
        assert_eq!(err, JoinTreeError::UndeclaredStream(2));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let err = JoinTree::builder(2).root(0).root(1).build().unwrap_err();
        assert_eq!(
            err,
            JoinTreeError::MultipleRoots {
                first: 0,
                second: 1
            }
        );
    }

    #[test]
    fn test_no_root_rejected() {
        let err = JoinTree::builder(2)
            .required(0, 1)
            .required(1, 0)
            .build()
            .unwrap_err();
        assert_eq!(err, JoinTreeError::NoRoot);
    }

    #[test]
    fn test_cycle_rejected() {
        // 0 is the root; 1 and 2 point at each other
        let err = JoinTree::builder(3)
            .root(0)
            .required(1, 2)
            .required(2, 1)
            .build()
            .unwrap_err();
        assert_eq!(err, JoinTreeError::Cycle(1));
    }

    #[test]
    fn test_self_parent_rejected() {
        let err = JoinTree::builder(2).root(0).required(1, 1).build().unwrap_err();
        assert_eq!(err, JoinTreeError::Cycle(1));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let err = JoinTree::builder(2)
            .root(0)
            .declare(1, Some(9), false)
            .build()
            .unwrap_err();
        assert_eq!(err, JoinTreeError::UnknownParent { stream: 1, parent: 9 });
    }

    #[test]
    fn test_optional_root_rejected() {
        let err = JoinTree::builder(1)
            .declare(0, None, true)
            .build()
            .unwrap_err();
        assert_eq!(err, JoinTreeError::OptionalRoot(0));
    }
}
