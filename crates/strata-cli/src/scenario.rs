//! Scenario files
//!
//! A scenario declares a join and the match sets of a series of passes, so
//! assembly can be exercised without a running engine. Both YAML and TOML
//! are accepted.
//!
//! # Example YAML scenario:
//! ```yaml
//! streams:
//!   - name: R
//!   - name: A
//!     parent: R
//!   - name: B
//!     parent: A
//!     optional: true
//!
//! assembly:
//!   single_result_fast_path: true
//!
//! logging:
//!   level: debug
//!
//! passes:
//!   - root: [R]
//!     matches:
//!       - stream: A
//!         parent: R
//!         events: [a1, a2]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strata_core::{JoinTree, JoinTreeError, StreamDecl};
use strata_runtime::{AssemblyError, AssemblyOptions};
use thiserror::Error;

/// A join declaration plus the passes to run over it
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Scenario {
    /// Streams of the join; the i-th entry is stream `i`
    pub streams: Vec<StreamDecl>,

    /// Assembly tuning
    pub assembly: AssemblyOptions,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Passes, run in order
    pub passes: Vec<PassDecl>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Match sets of one pass, written with event names
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PassDecl {
    /// Context partition the pass belongs to
    pub partition: Option<String>,

    /// Triggering events of the root stream
    pub root: Vec<String>,

    /// Lookup results, parents before children
    pub matches: Vec<MatchDecl>,
}

/// Events of `stream` that matched the parent-stream event `parent`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchDecl {
    pub stream: String,

    /// Parent-stream event the lookup was made for
    pub parent: String,

    /// Which of the parent stream's match entries holds `parent`, counted in
    /// declaration order. Defaults to the first one holding it.
    #[serde(default)]
    pub parent_match: Option<usize>,

    pub events: Vec<String>,
}

impl MatchDecl {
    pub fn new<I, S>(stream: impl Into<String>, parent: impl Into<String>, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stream: stream.into(),
            parent: parent.into(),
            parent_match: None,
            events: events.into_iter().map(Into::into).collect(),
        }
    }
}

/// Scenario file syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioFormat {
    Yaml,
    Toml,
}

impl ScenarioFormat {
    /// Format named by the file extension, if it names one
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml") {
            Some(Self::Yaml)
        } else if extension.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else {
            None
        }
    }
}

impl Scenario {
    /// Load a scenario from a file.
    ///
    /// The extension picks the format; any other file is tried as YAML, then
    /// as TOML, and both parse errors are reported if neither fits.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ScenarioError::Io(path.to_path_buf(), e.to_string()))?;

        match ScenarioFormat::from_path(path) {
            Some(ScenarioFormat::Yaml) => Self::from_yaml(&content),
            Some(ScenarioFormat::Toml) => Self::from_toml(&content),
            None => parse_yaml(&content).or_else(|yaml| {
                parse_toml(&content).map_err(|toml| ScenarioError::UnknownFormat { yaml, toml })
            }),
        }
    }

    /// Parse a scenario from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ScenarioError> {
        parse_yaml(content).map_err(ScenarioError::Parse)
    }

    /// Parse a scenario from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ScenarioError> {
        parse_toml(content).map_err(ScenarioError::Parse)
    }

    /// Compile the declared streams into a join tree
    pub fn tree(&self) -> Result<JoinTree, ScenarioError> {
        Ok(JoinTree::from_decls(&self.streams)?)
    }
}

fn parse_yaml(content: &str) -> Result<Scenario, String> {
    serde_yaml::from_str(content).map_err(|e| e.to_string())
}

fn parse_toml(content: &str) -> Result<Scenario, String> {
    toml::from_str(content).map_err(|e| e.to_string())
}

/// Scenario errors
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario file {0}: {1}")]
    Io(PathBuf, String),

    #[error("Failed to parse scenario: {0}")]
    Parse(String),

    #[error("Scenario is neither YAML ({yaml}) nor TOML ({toml})")]
    UnknownFormat { yaml: String, toml: String },

    #[error("Invalid join: {0}")]
    Tree(#[from] JoinTreeError),

    #[error("Pass {pass}: unknown stream '{stream}'")]
    UnknownStream { pass: usize, stream: String },

    #[error("Pass {pass}: root stream '{stream}' takes its events from `root`")]
    RootStreamMatch { pass: usize, stream: String },

    #[error("Pass {pass}: no match of the parent stream of '{stream}' holds event '{parent}'")]
    UnmatchedParent {
        pass: usize,
        stream: String,
        parent: String,
    },

    #[error("Pass {pass}: {source}")]
    Assembly {
        pass: usize,
        #[source]
        source: AssemblyError,
    },
}
