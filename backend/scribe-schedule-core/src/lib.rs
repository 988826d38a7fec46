// src/lib.rs
pub mod analytics;
pub mod api;
pub mod config;
pub mod monthly_report;
pub mod readiness;
pub mod roster;
pub mod scheduling_service;
pub mod session;
pub mod session_validation;
pub mod submission_store;
pub mod time_utils;

#[cfg(test)]
mod session_validation_tests;
