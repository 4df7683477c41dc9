pub mod indicators;
pub mod scalper;
pub mod traits;
