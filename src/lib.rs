//! Leaderless sync engine for a shared board document. Every replica
//! edits locally first; a periodic pull/push loop funnels everything
//! through a pure merge, so any set of clients converges through a
//! remote that is nothing more than a readable, replaceable JSON blob.

pub mod backup;
pub mod engine;
pub mod error;
pub mod merge;
pub mod model;
pub mod session;
pub mod store;
pub mod tombstone;
pub mod transport;
