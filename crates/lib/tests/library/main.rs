//! Integration tests for durastore-lib.

mod common;
mod concurrency_tests;
mod scenario_tests;
