//! Message orchestration: plan a task DAG for an inbound message, run the
//! extraction agents in dependency order, render the result as an
//! orchestration map, and project that map for different viewer roles.

pub mod agents;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;
pub mod planner;
pub mod provider;
pub mod runner;
pub mod view;
