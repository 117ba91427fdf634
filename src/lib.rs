pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod types;

// Application layer: aggregate and query use cases
pub mod app;

// Domain data shapes shared across layers
pub mod domain;
