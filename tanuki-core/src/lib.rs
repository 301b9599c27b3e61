//! Tanuki Core
//!
//! Resource model, schema and shared plumbing for providers that map
//! declarative configuration onto remote APIs

pub mod context;
pub mod differ;
pub mod effect;
pub mod id;
pub mod interpreter;
pub mod lock;
pub mod pagination;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod resource_data;
pub mod retry;
pub mod schema;
pub mod state_map;
