//! Shared test utilities for layscience integration tests.
//!
//! - `mocks`: scripted collaborators with call counters
//! - `harness`: an orchestrator over an in-memory store
//! - `fixtures`: small generated PDFs

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use harness::{test_settings, TestHarness};
pub use mocks::{MockExtractor, MockSource, MockSummarizer, PAPER_TEXT, SUMMARY};
