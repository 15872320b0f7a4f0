pub mod domain;
pub mod ports;

pub use domain::{
    ComparisonQuery, ComparisonResult, LoginGrant, ReportFile, ReportSummary, RetrievalState,
    Session, Trend, UploadReceipt, UploadRequest, UploadStatus, ValidationError, WeekNumber,
    PDF_MIME,
};
pub use ports::{KeyValueStore, KvOp, PortError, PortResult, ReportBackend, SessionSource};
