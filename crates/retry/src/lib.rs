//! Bounded retry for calls to external services.
//!
//! This crate provides:
//! - [`ClassifiedError`], the error an operation returns, carrying an explicit
//!   [`Classification`] set where the external call is made
//! - [`RetryEngine`], which retries retryable failures with exponential
//!   backoff and jitter inside an attempt and time budget
//! - [`UpstreamError`], raised when the engine gives up

pub mod config;
pub mod engine;
pub mod error;

pub use config::RetryConfig;
pub use engine::{RetryEngine, backoff_delay};
pub use error::{Classification, ClassifiedError, TransportKind, UpstreamError};
