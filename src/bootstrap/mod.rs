//! Bootstrap layer: modules that run before the conversation or server start.
//!
//! - **logger**: tracing-subscriber initialisation.

pub mod logger;
