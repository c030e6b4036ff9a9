//! Datacenter Registry
//!
//! CRUD and search over datacenter metadata records kept in a document
//! store, served over HTTP by the `datacenter-registry` binary.

pub mod api;
pub mod config;
pub mod error;
pub mod migration;
pub mod model;
pub mod query;
pub mod registry;
pub mod store;
