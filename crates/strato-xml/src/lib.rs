//! XML wire format for the strato S3 client.
//!
//! # Key components
//!
//! - [`S3Serialize`] trait and [`to_xml`] for request bodies (and, in tests, response bodies)
//! - [`S3Deserialize`] trait and [`from_xml`] for response bodies
//! - [`error_to_xml`] and [`is_error_document`] for the flat `<Error>` document
//!
//! # Conventions
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Booleans: lowercase `true`/`false`
//! - Timestamps: ISO 8601 format (`2006-02-03T16:45:09.000Z`)
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{S3Deserialize, from_xml, is_error_document, root_element};
pub use error::{XmlError, error_to_xml};
pub use serialize::{S3_NAMESPACE, S3Serialize, format_timestamp, to_xml};
