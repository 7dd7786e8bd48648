//! Assembly node family
//!
//! One assembly node exists per stream of the join tree. Its composition
//! strategy is fixed when the statement is compiled and follows the shape of
//! its children:
//!
//! | kind | children | behaviour |
//! |------|----------|-----------|
//! | leaf | none | emits a row per matched event |
//! | required branch | one required child | forwards child rows only |
//! | optional branch | one optional child | forwards child rows, then emits a row for every own event no child row covered |
//! | product | two or more | buffers child rows per own event, emits their cartesian product |
//!
//! A node's own required/optional flag is honoured by its parent: required
//! children without rows prune the parent's event, optional ones leave their
//! slots null.
//!
//! Nodes never hold references to each other. Emitting to the parent yields a
//! [`Delivery`] that the driver routes to the parent's arena slot, or to the
//! result collection when the emitting node is the root.

use std::fmt;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};
use strata_core::{JoinTree, StreamIndex};
use tracing::trace;

use crate::error::{AssemblyError, AssemblyResult};
use crate::matches::{MatchNode, MatchRef, MatchSets};
use crate::options::AssemblyOptions;
use crate::row::ResultRow;

/// A partial row travelling from a child to its parent.
///
/// `event` is the parent-stream event the child's match node was looked up
/// against and `at` the parent's match node holding it.
#[derive(Debug)]
pub(crate) struct ResultCall<E> {
    pub row: ResultRow<E>,
    pub from: StreamIndex,
    pub event: E,
    pub at: MatchRef,
}

/// Where an emitted row goes next
#[derive(Debug)]
pub(crate) enum Delivery<E> {
    /// Hand to the assembly node of `stream`
    Parent {
        stream: StreamIndex,
        call: ResultCall<E>,
    },
    /// Row is complete; append to the result collection
    Complete(ResultRow<E>),
}

/// Composition strategy of an assembly node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Leaf,
    RequiredBranch,
    OptionalBranch,
    Product,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NodeKind::Leaf => "leaf",
            NodeKind::RequiredBranch => "required-branch",
            NodeKind::OptionalBranch => "optional-branch",
            NodeKind::Product => "product",
        })
    }
}

/// Long-lived assembly state for one stream, reset by every pass
#[derive(Debug)]
pub struct AssemblyNode<E> {
    stream: StreamIndex,
    parent: Option<StreamIndex>,
    width: usize,
    strategy: Strategy<E>,
}

#[derive(Debug)]
enum Strategy<E> {
    Leaf,
    Required { child: StreamIndex },
    Optional(OptionalBranch<E>),
    Product(ProductBranch<E>),
}

impl<E> AssemblyNode<E> {
    #[inline]
    pub fn stream(&self) -> StreamIndex {
        self.stream
    }

    /// Parent stream; `None` for the root, whose rows complete the join
    #[inline]
    pub fn parent(&self) -> Option<StreamIndex> {
        self.parent
    }

    pub fn kind(&self) -> NodeKind {
        match self.strategy {
            Strategy::Leaf => NodeKind::Leaf,
            Strategy::Required { .. } => NodeKind::RequiredBranch,
            Strategy::Optional(_) => NodeKind::OptionalBranch,
            Strategy::Product(_) => NodeKind::Product,
        }
    }
}

impl<E: Clone + Eq + Hash> AssemblyNode<E> {
    /// Pick the strategy for `stream` from the shape of its children
    pub(crate) fn new(tree: &JoinTree, stream: StreamIndex) -> Self {
        let strategy = match tree.children(stream) {
            [] => Strategy::Leaf,
            &[child] if tree.is_optional(child) => Strategy::Optional(OptionalBranch::new(child)),
            &[child] => Strategy::Required { child },
            children => Strategy::Product(ProductBranch::new(tree, children)),
        };
        Self {
            stream,
            parent: tree.parent_of(stream),
            width: tree.num_streams(),
            strategy,
        }
    }

    /// Reset transient state for a new pass
    pub(crate) fn init(&mut self, matches: &MatchSets<E>, options: &AssemblyOptions) {
        match &mut self.strategy {
            Strategy::Leaf | Strategy::Required { .. } => {}
            Strategy::Optional(branch) => {
                branch.init(self.stream, matches, options.single_result_fast_path)
            }
            Strategy::Product(branch) => branch.init(),
        }
    }

    /// Emit the rows this node originates, after all descendants processed
    pub(crate) fn process(
        &mut self,
        matches: &MatchSets<E>,
        out: &mut Vec<Delivery<E>>,
    ) -> AssemblyResult<()> {
        let (stream, parent, width) = (self.stream, self.parent, self.width);
        match &mut self.strategy {
            Strategy::Leaf => {
                for (index, node) in matches.stream(stream).iter().enumerate() {
                    let at = MatchRef::new(stream, index);
                    for event in node.events() {
                        let row = seed_row(width, stream, event)?;
                        out.push(upward(stream, parent, row, at, node)?);
                    }
                }
            }
            // Rows through a required branch exist only if its child calls back
            Strategy::Required { .. } => {}
            Strategy::Optional(branch) => branch.process(stream, parent, width, matches, out)?,
            Strategy::Product(branch) => branch.process(stream, parent, width, matches, out)?,
        }
        trace!(
            "Assembly: stream {} processed as {}, {} deliveries pending",
            stream,
            self.kind(),
            out.len()
        );
        Ok(())
    }

    /// Accept a partial row from a child.
    ///
    /// Returns the delivery to continue with, or `None` when the row was
    /// buffered for a later `process`.
    pub(crate) fn result(
        &mut self,
        call: ResultCall<E>,
        matches: &MatchSets<E>,
    ) -> AssemblyResult<Option<Delivery<E>>> {
        let (stream, parent) = (self.stream, self.parent);
        match &mut self.strategy {
            Strategy::Leaf => Err(AssemblyError::UnexpectedChildResult {
                stream,
                from: call.from,
            }),
            Strategy::Required { child } => {
                if call.from != *child {
                    return Err(AssemblyError::UnexpectedChildResult {
                        stream,
                        from: call.from,
                    });
                }
                let (node, _) = own_match(matches, stream, call.at, &call.event)?;
                let ResultCall { mut row, event, at, .. } = call;
                row.set(stream, event)?;
                upward(stream, parent, row, at, node).map(Some)
            }
            Strategy::Optional(branch) => branch.result(stream, parent, call, matches).map(Some),
            Strategy::Product(branch) => {
                branch.result(stream, call, matches)?;
                Ok(None)
            }
        }
    }
}

/// Per-pass mode of an optional branch
#[derive(Debug)]
enum OptionalMode<E> {
    /// No matches for this stream in this pass
    Absent,
    /// Exactly one matched event
    Single { at: MatchRef, event: E },
    /// Several events, tracked through `completed`
    Multi,
}

#[derive(Debug)]
struct OptionalBranch<E> {
    child: StreamIndex,
    mode: OptionalMode<E>,
    received_child_callback: bool,
    /// `(match index, event position)` of events some child row already
    /// carried upward
    completed: FxHashSet<(usize, usize)>,
}

impl<E: Clone + Eq + Hash> OptionalBranch<E> {
    fn new(child: StreamIndex) -> Self {
        Self {
            child,
            mode: OptionalMode::Absent,
            received_child_callback: false,
            completed: FxHashSet::default(),
        }
    }

    fn init(&mut self, stream: StreamIndex, matches: &MatchSets<E>, fast_path: bool) {
        self.received_child_callback = false;
        self.completed.clear();

        let nodes = matches.stream(stream);
        self.mode = match nodes {
            [] => OptionalMode::Absent,
            [only] if fast_path && only.len() == 1 => match only.events().first() {
                Some(event) => OptionalMode::Single {
                    at: MatchRef::new(stream, 0),
                    event: event.clone(),
                },
                None => OptionalMode::Multi,
            },
            _ => OptionalMode::Multi,
        };
    }

    fn process(
        &mut self,
        stream: StreamIndex,
        parent: Option<StreamIndex>,
        width: usize,
        matches: &MatchSets<E>,
        out: &mut Vec<Delivery<E>>,
    ) -> AssemblyResult<()> {
        match &self.mode {
            OptionalMode::Absent => {}
            OptionalMode::Single { at, event } => {
                // A child callback already carried the event upward
                if self.received_child_callback {
                    return Ok(());
                }
                let (node, _) = own_match(matches, stream, *at, event)?;
                let row = seed_row(width, stream, event)?;
                out.push(upward(stream, parent, row, *at, node)?);
            }
            OptionalMode::Multi => {
                for (index, node) in matches.stream(stream).iter().enumerate() {
                    let at = MatchRef::new(stream, index);
                    for (position, event) in node.events().iter().enumerate() {
                        if self.completed.contains(&(index, position)) {
                            continue;
                        }
                        let row = seed_row(width, stream, event)?;
                        out.push(upward(stream, parent, row, at, node)?);
                    }
                }
            }
        }
        Ok(())
    }

    fn result(
        &mut self,
        stream: StreamIndex,
        parent: Option<StreamIndex>,
        call: ResultCall<E>,
        matches: &MatchSets<E>,
    ) -> AssemblyResult<Delivery<E>> {
        if call.from != self.child {
            return Err(AssemblyError::UnexpectedChildResult {
                stream,
                from: call.from,
            });
        }
        let (node, position) = own_match(matches, stream, call.at, &call.event)?;
        let ResultCall { mut row, event, at, .. } = call;

        self.received_child_callback = true;
        if let OptionalMode::Multi = self.mode {
            self.completed.insert((at.index, position));
        }

        row.set(stream, event)?;
        upward(stream, parent, row, at, node)
    }
}

#[derive(Debug)]
struct ProductChild {
    stream: StreamIndex,
    optional: bool,
    /// Slots a row from this child may fill
    substreams: Vec<StreamIndex>,
}

#[derive(Debug)]
struct ProductBranch<E> {
    children: Vec<ProductChild>,
    /// Child rows per `(match index, own event position)`, one list per child
    buffered: FxHashMap<(usize, usize), Vec<Vec<ResultRow<E>>>>,
    combos: Vec<ResultRow<E>>,
    next: Vec<ResultRow<E>>,
}

impl<E: Clone + Eq + Hash> ProductBranch<E> {
    fn new(tree: &JoinTree, children: &[StreamIndex]) -> Self {
        Self {
            children: children
                .iter()
                .map(|&child| ProductChild {
                    stream: child,
                    optional: tree.is_optional(child),
                    substreams: tree.substreams(child).to_vec(),
                })
                .collect(),
            buffered: FxHashMap::default(),
            combos: Vec::new(),
            next: Vec::new(),
        }
    }

    fn init(&mut self) {
        self.buffered.clear();
        self.combos.clear();
        self.next.clear();
    }

    fn result(
        &mut self,
        stream: StreamIndex,
        call: ResultCall<E>,
        matches: &MatchSets<E>,
    ) -> AssemblyResult<()> {
        let position = self
            .children
            .iter()
            .position(|child| child.stream == call.from)
            .ok_or(AssemblyError::UnexpectedChildResult {
                stream,
                from: call.from,
            })?;
        let (_, own) = own_match(matches, stream, call.at, &call.event)?;

        let num_children = self.children.len();
        self.buffered
            .entry((call.at.index, own))
            .or_insert_with(|| (0..num_children).map(|_| Vec::new()).collect())[position]
            .push(call.row);
        Ok(())
    }

    fn process(
        &mut self,
        stream: StreamIndex,
        parent: Option<StreamIndex>,
        width: usize,
        matches: &MatchSets<E>,
        out: &mut Vec<Delivery<E>>,
    ) -> AssemblyResult<()> {
        let Self {
            children,
            buffered,
            combos,
            next,
        } = self;

        for (index, node) in matches.stream(stream).iter().enumerate() {
            let at = MatchRef::new(stream, index);
            for (position, event) in node.events().iter().enumerate() {
                let child_rows = buffered.remove(&(index, position));

                combos.clear();
                combos.push(seed_row(width, stream, event)?);

                for (position, child) in children.iter().enumerate() {
                    let rows = child_rows
                        .as_ref()
                        .map(|per_child| per_child[position].as_slice())
                        .unwrap_or(&[]);
                    if rows.is_empty() {
                        if child.optional {
                            continue;
                        }
                        combos.clear();
                        break;
                    }

                    next.clear();
                    next.reserve(combos.len() * rows.len());
                    for base in combos.iter() {
                        for child_row in rows {
                            let mut merged = base.clone();
                            merged.merge_from(child_row, &child.substreams)?;
                            next.push(merged);
                        }
                    }
                    std::mem::swap(combos, next);
                }

                for row in combos.drain(..) {
                    out.push(upward(stream, parent, row, at, node)?);
                }
            }
        }
        Ok(())
    }
}

/// A fresh row holding only `event` at `stream`
fn seed_row<E: Clone>(width: usize, stream: StreamIndex, event: &E) -> AssemblyResult<ResultRow<E>> {
    let mut row = ResultRow::new(width);
    row.set(stream, event.clone())?;
    Ok(row)
}

/// Resolve a match node this stream was called back with, checking that it
/// belongs to the stream and holds `event`. Returns the node and the event's
/// position within it.
fn own_match<'m, E: Clone + Eq + Hash>(
    matches: &'m MatchSets<E>,
    stream: StreamIndex,
    at: MatchRef,
    event: &E,
) -> AssemblyResult<(&'m MatchNode<E>, usize)> {
    if at.stream != stream {
        return Err(AssemblyError::MatchStreamMismatch {
            stream,
            actual: at.stream,
        });
    }
    let node = matches.node(at).ok_or(AssemblyError::UnknownMatchNode {
        stream,
        index: at.index,
    })?;
    let position = node
        .events()
        .get_index_of(event)
        .ok_or(AssemblyError::ForeignEvent {
            stream,
            index: at.index,
        })?;
    Ok((node, position))
}

/// Route a row emitted by `stream` for an event of match node `node`
fn upward<E: Clone>(
    stream: StreamIndex,
    parent: Option<StreamIndex>,
    row: ResultRow<E>,
    at: MatchRef,
    node: &MatchNode<E>,
) -> AssemblyResult<Delivery<E>> {
    match (parent, node.parent(), node.parent_event()) {
        (None, None, _) => Ok(Delivery::Complete(row)),
        (None, Some(_), _) => Err(AssemblyError::UnexpectedParentLink {
            stream,
            index: at.index,
        }),
        (Some(expected), Some(link), Some(event)) => {
            if link.stream != expected {
                return Err(AssemblyError::ParentStreamMismatch {
                    stream,
                    expected,
                    actual: link.stream,
                });
            }
            Ok(Delivery::Parent {
                stream: expected,
                call: ResultCall {
                    row,
                    from: stream,
                    event: event.clone(),
                    at: link,
                },
            })
        }
        (Some(_), _, _) => Err(AssemblyError::MissingParentLink {
            stream,
            index: at.index,
        }),
    }
}
