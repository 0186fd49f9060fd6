//! Callback plan compilation: OpenAPI callback declarations become
//! immutable, executable [`CallbackPlan`] records at startup.

pub mod compiler;
pub mod loader;
pub mod models;

pub use compiler::PlanCompiler;
pub use models::{CallbackBodyPlan, CallbackExecutionPlan, CallbackPathParam, CallbackPlan};
