//! Rudder - a minimal container orchestration control plane
//!
//! Three independent roles coordinate only through the object store:
//!
//! - The API server ([`daemon`]) serves resources from a key-value
//!   [`registry`] through one generic [`store`]
//! - The [`scheduler`] assigns unscheduled pods to nodes, round-robin
//! - The node [`agent`] converges the [`runtime`] and [`network`] of its
//!   node toward the pods assigned to it

pub mod agent;
pub mod api;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod network;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use error::{Result, RudderError};
