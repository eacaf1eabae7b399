pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod sink;
