//! diagnose - Tier-aware LLM analysis orchestrator
//!
//! This library turns free-form problem descriptions into structured
//! analyses by walking a per-tier chain of LLM backends, with caching,
//! per-caller rate limiting and multi-turn conversation memory.

pub mod agent;
pub mod cache;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod limiter;
pub mod logging;
pub mod orchestrator;
pub mod prompt;
pub mod request;
pub mod tier;
pub mod types;
