//! Integration test suite entry point.

mod engine_flow_tests;
mod generation_flow_tests;
