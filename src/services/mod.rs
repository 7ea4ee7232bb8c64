pub mod avatar_service;
pub mod error;
pub mod grant;
pub mod post_policy;
pub mod records;
pub mod staging;
pub mod storage;
pub mod worker;
