/// Wall clock and interval-boundary alignment.
pub mod clock;
pub mod consumption;
/// Positional equipment assignment.
pub mod equipment;
pub mod replay;
/// Score normalizer and monitor loop.
pub mod score;
pub mod series;
