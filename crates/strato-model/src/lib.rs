//! Wire-level data model for the strato S3 client.
//!
//! - [`error`] - Service error codes, the retry taxonomy and [`ServiceError`]
//! - [`region`] - The region table and bucket addressing
//! - [`types`] - Listing pages, parts, uploads and object metadata

pub mod error;
pub mod region;
pub mod types;

pub use error::{ErrorClass, ErrorCode, ServiceError};
pub use region::{BucketAddressing, Region};
pub use types::{
    CannedAcl, CompleteMultipartResult, CompleteMultipartUpload, CompletedPart,
    CreateBucketConfiguration, InitiateMultipartResult, ListEntry, ListPage, ObjectMeta, Owner,
    Part, PartsPage, UploadEntry, UploadsPage,
};
