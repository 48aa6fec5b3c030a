//! HTTP handlers. Each decodes its input, calls the orchestrator and maps the
//! result through [`crate::response`].

pub mod activity;
pub mod boards;
pub mod lists;
pub mod members;
pub mod tasks;
