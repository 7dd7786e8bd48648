//! Runs the passes of a [`Scenario`]
//!
//! Event names are interned: every occurrence of a name across the scenario
//! refers to the same [`EventRef`], so a name reached through two lookups is
//! one event, exactly as it would be inside the engine.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use strata_core::{JoinTree, StreamIndex};
use strata_runtime::{
    AssemblyDriver, EventRef, MatchRef, MatchSets, PartitionedAssembly, ResultCollection,
};
use tracing::{debug, info};

use crate::scenario::{PassDecl, Scenario, ScenarioError};

/// Events as the scenario runner sees them
pub type NamedEvent = EventRef<String>;

/// Partition used by passes that do not name one
pub const DEFAULT_PARTITION: &str = "default";

pub struct ScenarioRunner {
    tree: Arc<JoinTree>,
    assembly: PartitionedAssembly<String, NamedEvent>,
    events: FxHashMap<String, NamedEvent>,
}

impl ScenarioRunner {
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let tree = Arc::new(scenario.tree()?);
        let assembly = PartitionedAssembly::with_options(Arc::clone(&tree), scenario.assembly.clone());
        Ok(Self {
            tree,
            assembly,
            events: FxHashMap::default(),
        })
    }

    pub fn tree(&self) -> &Arc<JoinTree> {
        &self.tree
    }

    /// The assembly plan, one line per node
    pub fn plan(&self) -> String {
        let driver: AssemblyDriver<NamedEvent> = AssemblyDriver::new(Arc::clone(&self.tree));
        driver.to_string()
    }

    /// Number of partitions that have run at least one pass
    pub fn partitions(&self) -> usize {
        self.assembly.len()
    }

    /// The interned event for `name`
    pub fn event(&mut self, name: &str) -> NamedEvent {
        if let Some(event) = self.events.get(name) {
            return event.clone();
        }
        let event = EventRef::new(name.to_string());
        self.events.insert(name.to_string(), event.clone());
        event
    }

    /// Resolve a pass declaration into match sets.
    ///
    /// `pass` is the 1-based pass number used in error messages.
    pub fn match_sets(
        &mut self,
        pass: usize,
        decl: &PassDecl,
    ) -> Result<MatchSets<NamedEvent>, ScenarioError> {
        let root = self.tree.root();
        let root_events: Vec<NamedEvent> = decl.root.iter().map(|name| self.event(name)).collect();
        let mut sets = MatchSets::with_root(self.tree.num_streams(), root, root_events);

        for entry in &decl.matches {
            let stream = self.tree.stream_named(&entry.stream).ok_or_else(|| {
                ScenarioError::UnknownStream {
                    pass,
                    stream: entry.stream.clone(),
                }
            })?;
            let Some(parent_stream) = self.tree.parent_of(stream) else {
                return Err(ScenarioError::RootStreamMatch {
                    pass,
                    stream: entry.stream.clone(),
                });
            };

            let parent_event = self.event(&entry.parent);
            let at = find_parent(&sets, parent_stream, &parent_event, entry.parent_match)
                .ok_or_else(|| ScenarioError::UnmatchedParent {
                    pass,
                    stream: entry.stream.clone(),
                    parent: entry.parent.clone(),
                })?;
            let events: Vec<NamedEvent> = entry.events.iter().map(|name| self.event(name)).collect();
            sets.add(stream, at, parent_event, events);
        }
        Ok(sets)
    }

    /// Run one pass in its partition
    pub fn run_pass(
        &mut self,
        pass: usize,
        decl: &PassDecl,
    ) -> Result<ResultCollection<NamedEvent>, ScenarioError> {
        let sets = self.match_sets(pass, decl)?;
        let partition = decl
            .partition
            .clone()
            .unwrap_or_else(|| DEFAULT_PARTITION.to_string());

        let rows = self
            .assembly
            .run_pass(&partition, &sets)
            .map_err(|source| ScenarioError::Assembly { pass, source })?;
        debug!("Pass {} in partition '{}': {} rows", pass, partition, rows.len());
        Ok(rows)
    }

    /// Run every pass of the scenario in order, stopping at the first error
    pub fn run_all(
        &mut self,
        scenario: &Scenario,
    ) -> Result<Vec<ResultCollection<NamedEvent>>, ScenarioError> {
        let results = scenario
            .passes
            .iter()
            .enumerate()
            .map(|(i, decl)| self.run_pass(i + 1, decl))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Ran {} passes across {} partitions",
            results.len(),
            self.partitions()
        );
        Ok(results)
    }
}

/// Match node of `stream` holding `event`; the `nth` such node when given
fn find_parent(
    sets: &MatchSets<NamedEvent>,
    stream: StreamIndex,
    event: &NamedEvent,
    nth: Option<usize>,
) -> Option<MatchRef> {
    let mut holding = sets
        .stream(stream)
        .iter()
        .enumerate()
        .filter(|(_, node)| node.events().contains(event))
        .map(|(index, _)| MatchRef::new(stream, index));
    holding.nth(nth.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::MatchDecl;
    use strata_core::StreamDecl;

    fn scenario(passes: Vec<PassDecl>) -> Scenario {
        Scenario {
            streams: vec![
                StreamDecl::root("R"),
                StreamDecl::required("A", "R"),
                StreamDecl::optional("B", "A"),
            ],
            passes,
            ..Default::default()
        }
    }

    fn render(rows: &ResultCollection<NamedEvent>) -> Vec<String> {
        rows.iter().map(|row| row.to_string()).collect()
    }

    #[test]
    fn test_names_are_interned() {
        let mut runner = ScenarioRunner::new(&scenario(vec![])).unwrap();
        let first = runner.event("a1");
        let again = runner.event("a1");
        let other = runner.event("a2");
        assert!(first.same(&again));
        assert!(!first.same(&other));
    }

    #[test]
    fn test_outer_join_pass() {
        let pass = PassDecl {
            root: vec!["R".into()],
            matches: vec![MatchDecl::new("A", "R", ["a1", "a2"])],
            ..Default::default()
        };
        let scenario = scenario(vec![pass]);
        let mut runner = ScenarioRunner::new(&scenario).unwrap();

        let results = runner.run_all(&scenario).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(render(&results[0]), ["[R, a1, null]", "[R, a2, null]"]);
        assert_eq!(runner.partitions(), 1);
    }

    #[test]
    fn test_parent_match_selects_among_duplicates() {
        // a1 is matched for both root events; B hangs off the second one
        let mut b = MatchDecl::new("B", "a1", ["b1"]);
        b.parent_match = Some(1);
        let pass = PassDecl {
            root: vec!["r1".into(), "r2".into()],
            matches: vec![
                MatchDecl::new("A", "r1", ["a1"]),
                MatchDecl::new("A", "r2", ["a1"]),
                b,
            ],
            ..Default::default()
        };
        let scenario = scenario(vec![pass]);
        let mut runner = ScenarioRunner::new(&scenario).unwrap();

        let rows = runner.run_all(&scenario).unwrap();
        assert_eq!(render(&rows[0]), ["[r2, a1, b1]", "[r1, a1, null]"]);
    }

    #[test]
    fn test_unknown_stream() {
        let pass = PassDecl {
            root: vec!["R".into()],
            matches: vec![MatchDecl::new("Z", "R", ["z1"])],
            ..Default::default()
        };
        let mut runner = ScenarioRunner::new(&scenario(vec![])).unwrap();
        assert!(matches!(
            runner.match_sets(3, &pass),
            Err(ScenarioError::UnknownStream { pass: 3, stream }) if stream == "Z"
        ));
    }

    #[test]
    fn test_root_stream_match_is_rejected() {
        let pass = PassDecl {
            root: vec!["R".into()],
            matches: vec![MatchDecl::new("R", "R", ["r2"])],
            ..Default::default()
        };
        let mut runner = ScenarioRunner::new(&scenario(vec![])).unwrap();
        assert!(matches!(
            runner.match_sets(1, &pass),
            Err(ScenarioError::RootStreamMatch { .. })
        ));
    }

    #[test]
    fn test_unmatched_parent() {
        let pass = PassDecl {
            root: vec!["R".into()],
            matches: vec![MatchDecl::new("B", "a1", ["b1"])],
            ..Default::default()
        };
        let mut runner = ScenarioRunner::new(&scenario(vec![])).unwrap();
        assert!(matches!(
            runner.match_sets(1, &pass),
            Err(ScenarioError::UnmatchedParent { parent, .. }) if parent == "a1"
        ));
    }
}
