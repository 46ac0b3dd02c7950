//! Transfer of letter archives to the print vendor

pub mod archive;
pub mod channel;
pub mod gateway;
pub mod retry;

pub use channel::{LocalDirectoryChannel, TransferChannel, TransferSession};
pub use gateway::{Availability, TransferGateway, UploadCycleReport, UploadOutcome};
pub use retry::RetryPolicy;
