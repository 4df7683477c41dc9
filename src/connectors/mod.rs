pub mod bitvavo;
pub mod feed;
pub mod messages;
pub mod traits;
