//! repolicy engine - the asynchronous side of a policy run
//!
//! Wraps the pure core with remote I/O:
//! - `RepositoryClient`: the settings API the engine reads and writes
//! - `RateLimitedClient`: quota tracking, Retry-After and backoff
//! - `CancelToken`: cancellation and deadlines for every wait
//! - `WorkerPool`: bounded per-repository fan-out
//! - `Engine`: resolve, evaluate, diff and apply

pub mod cancel;
pub mod client;
pub mod engine;
pub mod pool;
pub mod rate_limit;

pub use cancel::CancelToken;
pub use client::{QuotaSnapshot, RepositoryClient};
pub use engine::{Confirmer, DiffRun, Engine, EvaluationRun};
pub use pool::WorkerPool;
pub use rate_limit::RateLimitedClient;
