//! quiet-hn domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Stories, result sets, and cache entries
//! - `ports`: Trait definitions for the item source, result cache, and clock
//! - `usecases`: Fetch pool, rank aggregation, and the top stories service

pub mod model;
pub mod ports;
pub mod usecases;

pub use model::*;
pub use ports::*;
