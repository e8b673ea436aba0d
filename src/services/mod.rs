pub mod assessment;
pub mod circuit_breaker;
pub mod claims;
pub mod evidence;
pub mod invoker;
pub mod job_store;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod reaper;
pub mod transcript;

#[cfg(test)]
pub(crate) mod fakes;
