//! Case-status domain: receipt numbers, records, change detection and the
//! API client.

pub mod api_types;
pub mod changes;
pub mod client;
pub mod error;
pub mod receipt;
pub mod record;

pub use changes::ChangeFlags;
pub use client::{AuthStatus, CaseClient, CaseSource};
pub use error::LookupError;
pub use receipt::ReceiptNumber;
pub use record::CaseRecord;
