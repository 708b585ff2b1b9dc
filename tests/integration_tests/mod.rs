//! Integration tests module
//!
//! End-to-end runs of the crawl pipeline against the fixture directory served
//! by the offline renderer:
//! - Complete navigation → listing → detail runs
//! - Failure isolation, aborts and interrupts

pub mod error_scenarios;
pub mod pipeline_test;
