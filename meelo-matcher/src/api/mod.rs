//! HTTP surface of the matcher
//!
//! Status and health endpoints plus an intake route feeding the in-process
//! task queue.

pub mod health;
pub mod status;
pub mod tasks;

pub use health::health_routes;
pub use status::status_routes;
pub use tasks::task_routes;
