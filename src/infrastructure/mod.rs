pub mod database;
pub mod records;
pub mod seed;
pub mod storage;
