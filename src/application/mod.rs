//! Application services layer scaffolding.

pub mod error;
pub mod events;
pub mod stores;
pub mod todos;
