//! issuetable - render GitHub issue searches and project board views as tables
//!
//! This library crate exposes internal modules for integration testing and
//! for host toolchains embedding the pipeline.

pub mod cache;
pub mod config;
pub mod data;
pub mod directive;
pub mod github;
pub mod normalize;
pub mod query;
pub mod render;
