pub mod http;
pub mod kv_store;
pub mod report_file;

pub use http::HttpBackend;
pub use kv_store::{FileKeyValueStore, MemoryKeyValueStore};
pub use report_file::read_report;
