//! Per-pass match sets
//!
//! Index lookups deliver, for every stream, the events that matched a given
//! event of the parent stream. Each delivery becomes a [`MatchNode`]: the
//! matched events plus a link back to the parent event (and the parent's own
//! match node) they were looked up against. The root stream's match nodes
//! have no parent link.
//!
//! Match sets belong to one pass. [`MatchSets::clear`] empties them while
//! keeping the per-stream vectors for the next pass.

use std::hash::Hash;

use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use strata_core::{JoinTree, StreamIndex};

/// Insertion-ordered set with the Fx hasher
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

/// Address of a match node within [`MatchSets`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchRef {
    pub stream: StreamIndex,
    pub index: usize,
}

impl MatchRef {
    #[inline]
    pub fn new(stream: StreamIndex, index: usize) -> Self {
        Self { stream, index }
    }
}

/// Events of one stream matched against one parent event
#[derive(Debug, Clone)]
pub struct MatchNode<E> {
    stream: StreamIndex,
    parent: Option<MatchRef>,
    parent_event: Option<E>,
    events: FxIndexSet<E>,
}

impl<E> MatchNode<E> {
    #[inline]
    pub fn stream(&self) -> StreamIndex {
        self.stream
    }

    /// Match node holding the parent event
    #[inline]
    pub fn parent(&self) -> Option<MatchRef> {
        self.parent
    }

    /// Parent-stream event these events were matched against
    #[inline]
    pub fn parent_event(&self) -> Option<&E> {
        self.parent_event.as_ref()
    }

    #[inline]
    pub fn events(&self) -> &FxIndexSet<E> {
        &self.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// All match nodes of one pass, grouped by stream
#[derive(Debug, Clone)]
pub struct MatchSets<E> {
    streams: Vec<Vec<MatchNode<E>>>,
}

impl<E: Clone + Eq + Hash> MatchSets<E> {
    pub fn new(num_streams: usize) -> Self {
        Self {
            streams: (0..num_streams).map(|_| Vec::new()).collect(),
        }
    }

    /// Match sets seeded with the triggering events of the root stream
    pub fn with_root<I>(num_streams: usize, root_stream: StreamIndex, events: I) -> Self
    where
        I: IntoIterator<Item = E>,
    {
        let mut sets = Self::new(num_streams);
        sets.add_root(root_stream, events);
        sets
    }

    #[inline]
    pub fn num_streams(&self) -> usize {
        self.streams.len()
    }

    /// Record root-stream events; they carry no parent link.
    ///
    /// Returns `None`, recording nothing, when `events` is empty or `stream`
    /// is out of range.
    pub fn add_root<I>(&mut self, stream: StreamIndex, events: I) -> Option<MatchRef>
    where
        I: IntoIterator<Item = E>,
    {
        self.push(stream, None, None, events)
    }

    /// Record the events of `stream` that matched `parent_event`, which
    /// lives in match node `parent`.
    ///
    /// Returns `None`, recording nothing, when `events` is empty or `stream`
    /// is out of range.
    pub fn add<I>(
        &mut self,
        stream: StreamIndex,
        parent: MatchRef,
        parent_event: E,
        events: I,
    ) -> Option<MatchRef>
    where
        I: IntoIterator<Item = E>,
    {
        self.push(stream, Some(parent), Some(parent_event), events)
    }

    fn push<I>(
        &mut self,
        stream: StreamIndex,
        parent: Option<MatchRef>,
        parent_event: Option<E>,
        events: I,
    ) -> Option<MatchRef>
    where
        I: IntoIterator<Item = E>,
    {
        let nodes = self.streams.get_mut(stream)?;
        let events: FxIndexSet<E> = events.into_iter().collect();
        if events.is_empty() {
            return None;
        }
        nodes.push(MatchNode {
            stream,
            parent,
            parent_event,
            events,
        });
        Some(MatchRef::new(stream, nodes.len() - 1))
    }

    /// Match nodes of a stream, in insertion order.
    ///
    /// Empty for streams without matches and for out-of-range streams.
    pub fn stream(&self, stream: StreamIndex) -> &[MatchNode<E>] {
        self.streams.get(stream).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node(&self, at: MatchRef) -> Option<&MatchNode<E>> {
        self.streams.get(at.stream)?.get(at.index)
    }

    /// Every event of a stream together with the match node holding it
    pub fn cursors(&self, stream: StreamIndex) -> impl Iterator<Item = (MatchRef, &E)> + '_ {
        self.stream(stream)
            .iter()
            .enumerate()
            .flat_map(move |(index, node)| {
                node.events
                    .iter()
                    .map(move |event| (MatchRef::new(stream, index), event))
            })
    }

    /// Number of events matched for a stream across its match nodes
    pub fn event_count(&self, stream: StreamIndex) -> usize {
        self.stream(stream).iter().map(MatchNode::len).sum()
    }

    /// Forget all matches, keeping the per-stream storage
    pub fn clear(&mut self) {
        for nodes in &mut self.streams {
            nodes.clear();
        }
    }

    /// Fill the match sets for one pass by walking the tree top-down.
    ///
    /// The root stream receives `root_events`; every other stream is looked
    /// up once per event of its parent stream through
    /// `lookup(stream, parent_stream, parent_event)`. Existing matches are
    /// discarded first and the sets are resized to the tree's width.
    pub fn populate<I, F, L>(&mut self, tree: &JoinTree, root_events: I, mut lookup: F)
    where
        I: IntoIterator<Item = E>,
        F: FnMut(StreamIndex, StreamIndex, &E) -> L,
        L: IntoIterator<Item = E>,
    {
        self.clear();
        self.streams.resize_with(tree.num_streams(), Vec::new);
        self.add_root(tree.root(), root_events);

        let mut cursors: Vec<(MatchRef, E)> = Vec::new();
        for &stream in tree.preorder().iter().skip(1) {
            let Some(parent) = tree.parent_of(stream) else {
                continue;
            };
            cursors.clear();
            cursors.extend(
                self.cursors(parent)
                    .map(|(at, event)| (at, event.clone())),
            );
            for (at, parent_event) in cursors.drain(..) {
                let found = lookup(stream, parent, &parent_event);
                self.add(stream, at, parent_event, found);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_links_parent() {
        let mut sets = MatchSets::with_root(2, 0, ["r"]);
        let root = MatchRef::new(0, 0);
        let at = sets.add(1, root, "r", ["a1", "a2"]).unwrap();

        assert_eq!(at, MatchRef::new(1, 0));
        let node = sets.node(at).unwrap();
        assert_eq!(node.stream(), 1);
        assert_eq!(node.parent(), Some(root));
        assert_eq!(node.parent_event(), Some(&"r"));
        assert_eq!(node.events().iter().copied().collect::<Vec<_>>(), ["a1", "a2"]);
    }

    #[test]
    fn test_empty_events_are_not_recorded() {
        let mut sets = MatchSets::with_root(2, 0, ["r"]);
        let added = sets.add(1, MatchRef::new(0, 0), "r", Vec::<&str>::new());
        assert!(added.is_none());
        assert!(sets.stream(1).is_empty());
    }

    #[test]
    fn test_out_of_range_stream_is_not_recorded() {
        let mut sets = MatchSets::with_root(2, 0, ["r"]);
        assert!(sets.add(7, MatchRef::new(0, 0), "r", ["x"]).is_none());
        assert!(sets.add_root(2, ["y"]).is_none());
        assert_eq!(sets.num_streams(), 2);
        assert_eq!(sets.event_count(0), 1);
        assert_eq!(sets.event_count(1), 0);
    }

    #[test]
    fn test_duplicate_events_collapse_in_order() {
        let mut sets = MatchSets::new(1);
        sets.add_root(0, ["b", "a", "b"]);
        let events: Vec<_> = sets.stream(0)[0].events().iter().copied().collect();
        assert_eq!(events, ["b", "a"]);
    }

    #[test]
    fn test_cursors_span_match_nodes() {
        let mut sets = MatchSets::with_root(2, 0, ["r1", "r2"]);
        sets.add(1, MatchRef::new(0, 0), "r1", ["a1"]);
        sets.add(1, MatchRef::new(0, 0), "r2", ["a2", "a3"]);

        let cursors: Vec<_> = sets.cursors(1).map(|(at, e)| (at.index, *e)).collect();
        assert_eq!(cursors, [(0, "a1"), (1, "a2"), (1, "a3")]);
        assert_eq!(sets.event_count(1), 3);
    }

    #[test]
    fn test_out_of_range_lookups_are_empty() {
        let sets: MatchSets<u32> = MatchSets::new(1);
        assert!(sets.stream(5).is_empty());
        assert!(sets.node(MatchRef::new(0, 3)).is_none());
    }

    #[test]
    fn test_clear_keeps_width() {
        let mut sets = MatchSets::with_root(3, 0, [1u32]);
        sets.clear();
        assert_eq!(sets.num_streams(), 3);
        assert_eq!(sets.event_count(0), 0);
    }

    #[test]
    fn test_populate_walks_tree_top_down() {
        let tree = JoinTree::builder(3)
            .root(0)
            .required(1, 0)
            .optional(2, 1)
            .build()
            .unwrap();

        // Stream 1 matches events whose tens digit equals the parent;
        // stream 2 matches only parent 11.
        let mut sets = MatchSets::new(0);
        sets.populate(&tree, [1u32], |stream, _parent, &parent_event| match stream {
            1 => vec![parent_event * 10 + 1, parent_event * 10 + 2],
            2 if parent_event == 11 => vec![111],
            _ => vec![],
        });

        assert_eq!(sets.num_streams(), 3);
        assert_eq!(sets.event_count(0), 1);
        assert_eq!(sets.event_count(1), 2);
        assert_eq!(sets.stream(2).len(), 1);

        let node = &sets.stream(2)[0];
        assert_eq!(node.parent_event(), Some(&11));
        assert_eq!(node.parent(), Some(MatchRef::new(1, 0)));
    }
}
