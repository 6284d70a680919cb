pub mod start;
pub mod version;
