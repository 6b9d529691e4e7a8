pub mod aggregate;
pub mod config;
pub mod error;
pub mod git;
pub mod identifiers;
pub mod model;
pub mod modes;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod telemetry;
pub mod tracker;

#[cfg(test)]
mod testing;
