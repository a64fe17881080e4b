//! Configuration types and loaders for KEEL.
//!
//! This crate owns the on-disk configuration schema so the core library and
//! the host application share a single source of truth.

pub mod settings;

pub use settings::{FrameConfig, KeelConfig, LogFormat, LoggingConfig};
