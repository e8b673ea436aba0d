//! Perspective Prism
//!
//! Analyzes the claims made in a video transcript from four perspectives
//! (scientific, journalistic, partisan left and right) using LLM providers
//! behind a circuit breaker with automatic fallback. Analyses run as
//! background jobs whose partial results can be polled while they progress.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
