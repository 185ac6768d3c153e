//! Pieces shared by every tunepress crate: the failure taxonomy and the
//! `.context()` helper for crate-local errors.

pub mod context;
pub mod failure;

pub use {context::FromMessage, failure::FailureKind};
