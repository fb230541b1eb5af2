//! The crawl engine: frontier management under a fixed memory budget, a
//! concurrent worker pool, durable overflow backpressure, and the controller
//! that ties resume, run, and shutdown together.

pub mod controller;
pub mod fetcher;
pub mod frontier;
pub mod rate_limiter;

pub use controller::Crawler;
pub use frontier::{Frontier, PendingWork};
pub use rate_limiter::RateLimiter;
