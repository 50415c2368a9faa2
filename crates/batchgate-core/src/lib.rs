//! batchgate Core - Domain types, configuration and ports
//!
//! This crate contains the pieces every other batchgate crate agrees on:
//! - **Domain types** - `Outcome`, `WorkItem`, `ItemStatus`, `BatchResult`, `BatchStats`
//! - **Configuration** - typed YAML configuration with validation and a builder
//! - **Port definitions** - the `RemoteCallExecutor` trait adapters implement
//!
//! # Architecture
//!
//! The domain module is pure data and state-machine logic with no runtime
//! dependencies. Scheduling (gate, limiter, retry, coordinator) lives in
//! `batchgate-engine`; concrete executors live in adapter crates such as
//! `batchgate-http`.

pub mod config;
pub mod domain;
pub mod ports;
