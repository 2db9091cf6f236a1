pub mod database;
pub mod export;
pub mod records;
pub mod report;
