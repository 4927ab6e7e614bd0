//! XML serialization: converting model types to S3 wire documents.
//!
//! The client serializes request bodies (`CompleteMultipartUpload`,
//! `CreateBucketConfiguration`); the in-memory test service serializes the
//! listing and multipart responses.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use strato_model::types::{
    CompleteMultipartResult, CompleteMultipartUpload, CreateBucketConfiguration,
    InitiateMultipartResult, ListEntry, ListPage, Owner, Part, PartsPage, UploadEntry,
    UploadsPage,
};

use crate::error::XmlError;

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Trait for serializing types to XML.
///
/// Implementors write their content as child elements inside the current XML context.
/// The root element name and namespace are handled by the top-level [`to_xml`] function.
pub trait S3Serialize {
    /// Serialize this value as XML child elements into the given writer.
    ///
    /// # Errors
    ///
    /// Returns `io::Error` if writing to the underlying writer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize a value as a complete XML document with declaration and namespace.
///
/// ```
/// use strato_model::types::CreateBucketConfiguration;
/// use strato_xml::to_xml;
///
/// let body = to_xml(
///     "CreateBucketConfiguration",
///     &CreateBucketConfiguration { location_constraint: "eu-west-1".to_owned() },
/// )
/// .unwrap();
/// let body = String::from_utf8(body).unwrap();
/// assert!(body.contains("<LocationConstraint>eu-west-1</LocationConstraint>"));
/// ```
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;

    Ok(buf)
}

// ---------------------------------------------------------------------------
// Helper functions for writing common XML patterns
// ---------------------------------------------------------------------------

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

fn write_number<W: Write>(writer: &mut Writer<W>, tag: &str, value: u64) -> io::Result<()> {
    write_text_element(writer, tag, &value.to_string())
}

fn write_timestamp<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: &DateTime<Utc>,
) -> io::Result<()> {
    write_text_element(writer, tag, &format_timestamp(value))
}

/// Format a timestamp as ISO 8601 with milliseconds and `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn write_common_prefixes<W: Write>(writer: &mut Writer<W>, prefixes: &[String]) -> io::Result<()> {
    for prefix in prefixes {
        writer
            .create_element("CommonPrefixes")
            .write_inner_content(|w| write_text_element(w, "Prefix", prefix))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

impl S3Serialize for CompleteMultipartUpload {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        for part in &self.parts {
            writer.create_element("Part").write_inner_content(|w| {
                write_number(w, "PartNumber", u64::from(part.number))?;
                write_text_element(w, "ETag", &part.etag)
            })?;
        }
        Ok(())
    }
}

impl S3Serialize for CreateBucketConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "LocationConstraint", &self.location_constraint)
    }
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

impl S3Serialize for Owner {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "ID", &self.id)?;
        write_text_element(writer, "DisplayName", &self.display_name)
    }
}

impl S3Serialize for ListEntry {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Key", &self.key)?;
        write_timestamp(writer, "LastModified", &self.last_modified)?;
        write_text_element(writer, "ETag", &self.etag)?;
        write_number(writer, "Size", self.size)?;
        write_text_element(writer, "StorageClass", &self.storage_class)?;
        if let Some(owner) = &self.owner {
            writer
                .create_element("Owner")
                .write_inner_content(|w| owner.serialize_xml(w))?;
        }
        Ok(())
    }
}

impl S3Serialize for ListPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", &self.name)?;
        write_text_element(writer, "Prefix", &self.prefix)?;
        write_text_element(writer, "Marker", &self.marker)?;
        write_optional_text(writer, "NextMarker", self.next_marker.as_deref())?;
        write_number(writer, "MaxKeys", u64::from(self.max_keys))?;
        write_text_element(writer, "Delimiter", &self.delimiter)?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for entry in &self.contents {
            writer
                .create_element("Contents")
                .write_inner_content(|w| entry.serialize_xml(w))?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for Part {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_number(writer, "PartNumber", u64::from(self.number))?;
        if let Some(last_modified) = &self.last_modified {
            write_timestamp(writer, "LastModified", last_modified)?;
        }
        write_text_element(writer, "ETag", &self.etag)?;
        write_number(writer, "Size", self.size)
    }
}

impl S3Serialize for PartsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        write_number(
            writer,
            "PartNumberMarker",
            u64::from(self.part_number_marker),
        )?;
        write_number(
            writer,
            "NextPartNumberMarker",
            u64::from(self.next_part_number_marker),
        )?;
        write_number(writer, "MaxParts", u64::from(self.max_parts))?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for part in &self.parts {
            writer
                .create_element("Part")
                .write_inner_content(|w| part.serialize_xml(w))?;
        }
        Ok(())
    }
}

impl S3Serialize for UploadEntry {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)?;
        if let Some(initiated) = &self.initiated {
            write_timestamp(writer, "Initiated", initiated)?;
        }
        Ok(())
    }
}

impl S3Serialize for UploadsPage {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "KeyMarker", &self.key_marker)?;
        write_text_element(writer, "UploadIdMarker", &self.upload_id_marker)?;
        write_text_element(writer, "NextKeyMarker", &self.next_key_marker)?;
        write_text_element(writer, "NextUploadIdMarker", &self.next_upload_id_marker)?;
        write_text_element(writer, "Prefix", &self.prefix)?;
        write_text_element(writer, "Delimiter", &self.delimiter)?;
        write_number(writer, "MaxUploads", u64::from(self.max_uploads))?;
        write_bool(writer, "IsTruncated", self.is_truncated)?;
        for upload in &self.uploads {
            writer
                .create_element("Upload")
                .write_inner_content(|w| upload.serialize_xml(w))?;
        }
        write_common_prefixes(writer, &self.common_prefixes)
    }
}

impl S3Serialize for InitiateMultipartResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "UploadId", &self.upload_id)
    }
}

impl S3Serialize for CompleteMultipartResult {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Location", &self.location)?;
        write_text_element(writer, "Bucket", &self.bucket)?;
        write_text_element(writer, "Key", &self.key)?;
        write_text_element(writer, "ETag", &self.etag)
    }
}
