//! Data layer: the batch record schema and the status document that holds
//! every record.

pub mod batch_record;
pub mod status_document;

pub use batch_record::{BatchFailure, BatchRecord, BatchType, RequestCounts};
pub use status_document::StatusDocument;
