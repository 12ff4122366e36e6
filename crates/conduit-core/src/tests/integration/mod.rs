#![cfg(test)]

pub mod common;
pub mod churn_tests;
pub mod engine_scenario_tests;
pub mod event_tests;
