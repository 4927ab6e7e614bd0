//! S3-protocol client for strato.
//!
//! An [`S3`] client signs requests for one region, executes them under a
//! retry policy and exposes buckets, objects, listings and multipart uploads.
//!
//! # Architecture
//!
//! ```text
//! Bucket / Multi (operations, listing, multipart)
//!        |
//!        v
//! S3::execute (sign, send, classify, retry)
//!        |
//!        v
//!   Transport (reqwest, or an in-memory service in tests)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use strato_auth::Credentials;
//! use strato_client::{PutOptions, S3};
//! use strato_model::region::US_EAST_1;
//! use strato_model::types::CannedAcl;
//!
//! # async fn run() -> Result<(), strato_client::Error> {
//! let s3 = S3::new(Credentials::from_env()?, US_EAST_1)?;
//! let bucket = s3.bucket("my-bucket");
//! bucket.put_bucket(CannedAcl::Private).await?;
//! bucket
//!     .put("name", Bytes::from_static(b"content"), "text/plain", CannedAcl::Private, PutOptions::default())
//!     .await?;
//! assert_eq!(bucket.get("name").await?, Bytes::from_static(b"content"));
//! # Ok(())
//! # }
//! ```

pub mod attempt;
pub mod bucket;
pub mod checksum;
pub mod client;
pub mod config;
pub mod error;
mod executor;
mod list;
pub mod multipart;
mod request;
pub mod transport;

pub use attempt::{Attempt, AttemptStrategy};
pub use bucket::{Bucket, PutOptions, Reachability};
pub use client::S3;
pub use config::{ClientConfig, SigningVersion};
pub use error::{Error, ErrorKind};
pub use multipart::Multi;
pub use transport::{ObjectReader, Payload, ResponseBody, Transport, TransportError, TransportErrorKind};
