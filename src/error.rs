//! Error kinds shared across the aggregation core.
//!
//! Per-request failures never leave this process as a transport error; they
//! are carried in the RPC `Status` field instead (see `crate::aggregator`).
//! Only configuration errors are fatal, and only at startup.

use displaydoc::Display;
use thiserror::Error;

/// A malformed devpath string. Never surfaced to clients directly: the
/// mapper turns it into `None`, the graph generator fails the whole build.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum DevpathError {
    /// devpath `{0}` is not in the form `/phys(/SEG)*[:ns:text]`
    InvalidFormat(String),
}

/// Errors raised while building one agent's topology graph from its flat
/// local devpath listing.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum GeneratorError {
    /// {0}
    InvalidDevpath(#[from] DevpathError),
    /// generated graph for agent `{0}` contains a cycle, which a sorted bare-path input should never produce
    CycleDetected(String),
    /// generator input devpath `{0}` carries a suffix; only plugin devpaths are accepted
    UnexpectedSuffix(String),
}

/// Fatal configuration errors, raised while building a `GraphDevpathMapper`
/// from a `MergeSpec`. These abort process startup before any RPC is served.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// invert_op for agent `{agent}` targets `{devpath}` but supplies {got} upstream connectors, needs {want}
    InvertConnectorCountMismatch {
        agent: String,
        devpath: String,
        got: usize,
        want: usize,
    },
    /// invert_op for agent `{agent}` could not find vertex for local devpath `{devpath}`
    InvertVertexNotFound { agent: String, devpath: String },
    /// merge_spec.root `{0}` does not name a known agent
    UnknownRootAgent(String),
    /// merge_op references unknown vertex `({agent}, {devpath})`
    MergeVertexNotFound { agent: String, devpath: String },
    /// merge pass made no progress; spec.merge_ops are not satisfiable from root `{0}`
    SpecUnsatisfiable(String),
    /// merged graph contains a cycle, which should be structurally impossible
    CycleDetected,
    /// agent `{0}` appears more than once in configuration
    DuplicateAgent(String),
    /// building agent `{0}`'s per-agent graph failed
    GraphBuildFailed(String),
}

/// A downstream Redfish fetch failure. Internal to the collector: it
/// surfaces to the aggregator as a non-`OK` query status, never as a
/// transport error on the RPC itself.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// fetching `{uri}` failed: {message}
    FetchFailed { uri: String, message: String },
    /// fetching `{uri}` exceeded its deadline
    DeadlineExceeded { uri: String },
}
