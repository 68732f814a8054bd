//! Library crate for readiness-check: local listeners, remote probes and the
//! run orchestration that ties them together.
pub mod config;
pub mod dialer;
pub mod handler;
pub mod listener;
pub mod orchestrator;
pub mod report;
pub mod results;
pub mod types;
