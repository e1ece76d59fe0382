//! The devpath topology engine: vocabulary, per-agent graph construction,
//! inversion, merging, and the snapshot-based mapper built on top of them.

pub mod generator;
pub mod graph;
pub mod inverter;
pub mod mapper;
pub mod merger;
pub mod vocab;

pub use mapper::{AgentEntry, GraphDevpathMapper, MapperConfig, SnapshotUpdater, StaticUpdater};
pub use merger::{MergeOp, MergeOpKind, MergeSpec};
pub use inverter::InvertOp;
