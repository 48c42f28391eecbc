// Batch pipeline: bulk resume drafting against a set of job targets.
// Implements: durable batch/item store, drafting engine, per-item processing,
// bounded-concurrency batch runs, and result settlement.
// All LLM calls go through llm_client — no direct Anthropic SDK calls here.

pub mod aggregator;
pub mod engine;
pub mod handlers;
pub mod processor;
pub mod prompts;
pub mod runner;
pub mod store;

#[cfg(test)]
pub mod testkit;
