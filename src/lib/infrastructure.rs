//! Adapters for external systems

pub mod email;
