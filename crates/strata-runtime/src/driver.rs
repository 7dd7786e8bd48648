//! Assembly driver
//!
//! The driver owns the assembly arena of one join statement (or one context
//! partition of it) and runs passes:
//!
//! 1. `init` every node, in stream order, before anything is processed
//! 2. `process` every node children-first, so an optional branch only emits
//!    its null-padded rows once no descendant can still call back
//! 3. route each emitted row upward through the arena until it completes at
//!    the root or is buffered by a product node
//!
//! Node state is reused between passes; nothing is reallocated per pass
//! except the rows themselves.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use strata_core::{JoinTree, StreamIndex};
use tracing::{debug, error};

use crate::assembly::{AssemblyNode, Delivery};
use crate::error::{AssemblyError, AssemblyResult};
use crate::matches::MatchSets;
use crate::options::AssemblyOptions;
use crate::row::ResultCollection;

pub struct AssemblyDriver<E> {
    tree: Arc<JoinTree>,
    options: AssemblyOptions,
    /// Indexed by stream
    nodes: Vec<AssemblyNode<E>>,
    pending: Vec<Delivery<E>>,
    passes: u64,
}

impl<E: Clone + Eq + Hash> AssemblyDriver<E> {
    pub fn new(tree: Arc<JoinTree>) -> Self {
        Self::with_options(tree, AssemblyOptions::default())
    }

    pub fn with_options(tree: Arc<JoinTree>, options: AssemblyOptions) -> Self {
        let nodes = (0..tree.num_streams())
            .map(|stream| AssemblyNode::new(&tree, stream))
            .collect();
        Self {
            tree,
            options,
            nodes,
            pending: Vec::new(),
            passes: 0,
        }
    }

    pub fn tree(&self) -> &Arc<JoinTree> {
        &self.tree
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    pub fn node(&self, stream: StreamIndex) -> Option<&AssemblyNode<E>> {
        self.nodes.get(stream)
    }

    /// Number of passes completed successfully
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Assemble the join rows for one pass
    pub fn run_pass(&mut self, matches: &MatchSets<E>) -> AssemblyResult<ResultCollection<E>> {
        let mut rows = ResultCollection::with_capacity(self.options.row_capacity);
        self.run_pass_into(matches, &mut rows)?;
        Ok(rows)
    }

    /// Assemble one pass, appending to `rows`.
    ///
    /// On error `rows` is left exactly as it was before the call.
    pub fn run_pass_into(
        &mut self,
        matches: &MatchSets<E>,
        rows: &mut ResultCollection<E>,
    ) -> AssemblyResult<()> {
        let start = rows.len();
        match self.assemble(matches, rows) {
            Ok(()) => {
                self.passes += 1;
                debug!(
                    "Assembly pass {} produced {} rows",
                    self.passes,
                    rows.len() - start
                );
                Ok(())
            }
            Err(e) => {
                rows.truncate(start);
                self.pending.clear();
                error!("Assembly pass aborted: {}", e);
                Err(e)
            }
        }
    }

    fn assemble(
        &mut self,
        matches: &MatchSets<E>,
        rows: &mut ResultCollection<E>,
    ) -> AssemblyResult<()> {
        if matches.num_streams() != self.nodes.len() {
            return Err(AssemblyError::StreamCountMismatch {
                expected: self.nodes.len(),
                actual: matches.num_streams(),
            });
        }

        for node in &mut self.nodes {
            node.init(matches, &self.options);
        }

        let tree = Arc::clone(&self.tree);
        for &stream in tree.postorder() {
            self.nodes[stream].process(matches, &mut self.pending)?;
            self.dispatch(matches, rows)?;
        }
        Ok(())
    }

    /// Route everything the last `process` emitted, in emission order
    fn dispatch(
        &mut self,
        matches: &MatchSets<E>,
        rows: &mut ResultCollection<E>,
    ) -> AssemblyResult<()> {
        let mut pending = std::mem::take(&mut self.pending);
        let mut outcome = Ok(());
        for delivery in pending.drain(..) {
            if let Err(e) = self.deliver(delivery, matches, rows) {
                outcome = Err(e);
                break;
            }
        }
        self.pending = pending;
        outcome
    }

    fn deliver(
        &mut self,
        mut delivery: Delivery<E>,
        matches: &MatchSets<E>,
        rows: &mut ResultCollection<E>,
    ) -> AssemblyResult<()> {
        loop {
            match delivery {
                Delivery::Complete(row) => {
                    rows.push(row);
                    return Ok(());
                }
                Delivery::Parent { stream, call } => {
                    match self.nodes[stream].result(call, matches)? {
                        Some(next) => delivery = next,
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    fn fmt_plan(&self, f: &mut fmt::Formatter<'_>, stream: StreamIndex, depth: usize) -> fmt::Result {
        let node = &self.nodes[stream];
        write!(
            f,
            "{:indent$}{} stream={} ({})",
            "",
            node.kind(),
            stream,
            self.tree.label(stream),
            indent = depth * 2
        )?;
        if self.tree.is_optional(stream) {
            f.write_str(" optional")?;
        }
        f.write_str("\n")?;
        for &child in self.tree.children(stream) {
            self.fmt_plan(f, child, depth + 1)?;
        }
        Ok(())
    }
}

/// Renders the assembly plan, one indented line per node
impl<E: Clone + Eq + Hash> fmt::Display for AssemblyDriver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_plan(f, self.tree.root(), 0)
    }
}

impl<E> fmt::Debug for AssemblyDriver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssemblyDriver")
            .field("num_streams", &self.nodes.len())
            .field("root", &self.tree.root())
            .field("options", &self.options)
            .field("passes", &self.passes)
            .finish()
    }
}
