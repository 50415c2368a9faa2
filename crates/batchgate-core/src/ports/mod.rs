//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the engine depends on but whose implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`RemoteCallExecutor`] - performs one remote call for one work descriptor

pub mod executor;

pub use executor::RemoteCallExecutor;
