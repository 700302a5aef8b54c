//! Persistence layer: index artifacts, WAL, snapshots, and crash recovery.

pub mod engine;
pub mod segment;
pub mod serialization;
pub mod snapshot;
pub mod wal;
