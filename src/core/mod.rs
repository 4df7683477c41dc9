pub mod engine;
pub mod journal;
pub mod period;
pub mod portfolio;
pub mod sizing;
pub mod status;
