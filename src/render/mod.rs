//! Rendering: structured content nodes, column renderers, table assembly,
//! and a markdown text backend.

pub mod columns;
pub mod content;
pub mod markdown;
pub mod table;
