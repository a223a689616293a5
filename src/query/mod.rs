//! Query execution: covering, concurrent cell scans and result merging.

pub mod engine;
pub mod fanout;

pub use engine::{QueryEngine, QueryOutcome, QueryStats};
pub use fanout::{FanOutOptions, fan_out};
