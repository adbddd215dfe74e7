//! A small real-time shared todo service with tiered storage.
//!
//! One logical task list is kept coherent across two tiers: recent tasks
//! live as a single JSON blob in a hot Redis key, and once the hot set
//! outgrows its threshold the add path drains it into a MongoDB archive.
//! Connected clients receive the full merged list over a WebSocket push
//! channel after every mutation.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
