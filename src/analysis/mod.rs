//! Structural and data diagnostics for a built model.
pub mod diagnostics;
pub mod topology;
