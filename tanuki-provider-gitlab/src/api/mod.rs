//! Request and response bodies of the GitLab REST API
//!
//! Option structs omit unset fields from the serialized body, so a Create
//! only sends what was configured and an Update only what changed.

pub mod branches;
pub mod cluster_agents;
pub mod issues;
pub mod milestones;
pub mod projects;
pub mod repository_files;
pub mod users;
pub mod variables;
