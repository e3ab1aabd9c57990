pub mod errors;
pub mod event;
pub mod headers;
pub mod kv;
pub mod mem_store;
pub mod tables;
