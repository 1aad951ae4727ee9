//! Renewable-energy annotation generator for cluster resources.
//!
//! Weather-station records go through generation models and look-ahead
//! forecasts, and the resulting series is replayed onto cluster resources as
//! metadata annotations on wall-clock interval boundaries.

pub mod cluster;
pub mod config;
pub mod devices;
pub mod error;
pub mod forecast;
/// Station-file reader and CSV annotation sink.
pub mod io;
/// Series preparation, replay, and scoring.
pub mod sim;
