pub mod collector_task;
pub mod config;
pub mod field_mapper;
pub mod reading;
pub mod supervisor;
pub mod upload_task;
