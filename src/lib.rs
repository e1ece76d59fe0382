//! Machine Master: aggregates per-agent resource inventories behind one
//! streaming RPC surface, translating between machine-global and per-agent
//! devpaths as it goes.

pub mod aggregator;
pub mod clock;
pub mod collector;
pub mod config;
pub mod devpath;
pub mod error;
pub mod frontend;
pub mod mock;
pub mod proto;
pub mod redfish;
