pub mod reaper;
pub mod registry;
pub mod storage;
pub mod token;
pub mod transfer;
