//! Board block: composes the atoms into orchestrated operations and exposes
//! them as HTTP handlers.

pub mod effects;
pub mod http;
pub mod orchestrator;
pub mod response;
pub mod types;

pub use effects::{Effects, Emission};
pub use orchestrator::{BoardOrchestrator, Settings};
