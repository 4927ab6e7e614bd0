//! XML deserialization: parsing S3 wire documents into model types.
//!
//! The client parses every response body it receives; the in-memory test
//! service parses the request bodies. Unknown elements are skipped, missing
//! optional elements keep their defaults.

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use strato_model::ServiceError;
use strato_model::error::ErrorCode;
use strato_model::types::{
    CompleteMultipartResult, CompleteMultipartUpload, CompletedPart, CreateBucketConfiguration,
    InitiateMultipartResult, ListEntry, ListPage, Owner, Part, PartsPage, UploadEntry,
    UploadsPage,
};

use crate::error::XmlError;

/// Trait for deserializing types from XML.
///
/// The root element has already been consumed by the caller; the implementation
/// reads child elements until the matching end tag.
pub trait S3Deserialize: Sized {
    /// Deserialize an instance from the given XML reader.
    ///
    /// # Errors
    ///
    /// Returns `XmlError` if the XML is malformed or required fields are missing.
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError>;
}

/// Deserialize an XML document into a typed value.
///
/// ```
/// use strato_model::types::InitiateMultipartResult;
/// use strato_xml::from_xml;
///
/// let body = br#"<?xml version="1.0" encoding="UTF-8"?>
/// <InitiateMultipartUploadResult>
///   <Bucket>b</Bucket><Key>k</Key><UploadId>u-1</UploadId>
/// </InitiateMultipartUploadResult>"#;
/// let result: InitiateMultipartResult = from_xml(body).unwrap();
/// assert_eq!(result.upload_id, "u-1");
/// ```
pub fn from_xml<T: S3Deserialize>(xml: &[u8]) -> Result<T, XmlError> {
    let mut reader = Reader::from_reader(xml);

    loop {
        match reader.read_event()? {
            Event::Start(_) => return T::deserialize_xml(&mut reader),
            Event::Empty(e) => {
                return Err(XmlError::UnexpectedElement(format!(
                    "empty root element {}",
                    utf8(e.local_name().as_ref())?
                )));
            }
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// The name of the document's root element.
pub fn root_element(xml: &[u8]) -> Result<String, XmlError> {
    let mut reader = Reader::from_reader(xml);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => return utf8(e.local_name().as_ref()),
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// Whether the body is an `<Error>` document.
///
/// Some operations report failure with a 200 status and an error body.
#[must_use]
pub fn is_error_document(xml: &[u8]) -> bool {
    matches!(root_element(xml).as_deref(), Ok("Error"))
}

// ---------------------------------------------------------------------------
// Helper functions for reading common XML patterns
// ---------------------------------------------------------------------------

fn utf8(bytes: &[u8]) -> Result<String, XmlError> {
    std::str::from_utf8(bytes)
        .map(ToOwned::to_owned)
        .map_err(|e| XmlError::ParseError(e.to_string()))
}

/// Visit every child element of the current element.
///
/// `visit` receives the child's local name and must consume the child through
/// its end tag (by reading it or calling [`skip_element`]).
fn read_children<F>(reader: &mut Reader<&[u8]>, context: &str, mut visit: F) -> Result<(), XmlError>
where
    F: FnMut(&mut Reader<&[u8]>, &str) -> Result<(), XmlError>,
{
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = utf8(e.local_name().as_ref())?;
                visit(reader, &name)?;
            }
            Event::End(_) => return Ok(()),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(format!(
                    "unexpected EOF in {context}"
                )));
            }
            _ => {}
        }
    }
}

/// Read the text content of the current element and consume its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&decoded);
            }
            Event::GeneralRef(r) => {
                if let Some(ch) = r.resolve_char_ref()? {
                    text.push(ch);
                } else {
                    let name = r
                        .decode()
                        .map_err(|err| XmlError::ParseError(err.to_string()))?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                        .ok_or_else(|| XmlError::ParseError(format!("unknown entity &{name};")))?;
                    text.push_str(resolved);
                }
            }
            Event::End(_) => return Ok(text),
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while reading text content".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

/// Skip over an element and all its children.
fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => {
                return Err(XmlError::UnexpectedElement(
                    "unexpected EOF while skipping element".to_owned(),
                ));
            }
            _ => {}
        }
    }
}

fn parse_bool(s: &str) -> Result<bool, XmlError> {
    match s.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(XmlError::ParseError(format!("invalid boolean: {other}"))),
    }
}

fn parse_u32(s: &str) -> Result<u32, XmlError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    s.parse::<u32>()
        .map_err(|e| XmlError::ParseError(format!("invalid u32 '{s}': {e}")))
}

fn parse_u64(s: &str) -> Result<u64, XmlError> {
    let s = s.trim();
    s.parse::<u64>()
        .map_err(|e| XmlError::ParseError(format!("invalid u64 '{s}': {e}")))
}

/// Parse an ISO 8601 timestamp.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, XmlError> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
                .map(|ndt| ndt.and_utc())
        })
        .map_err(|e| XmlError::ParseError(format!("invalid timestamp '{s}': {e}")))
}

/// `<CommonPrefixes><Prefix>p</Prefix></CommonPrefixes>`
fn read_common_prefix(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut prefix = String::new();
    read_children(reader, "CommonPrefixes", |reader, tag| {
        match tag {
            "Prefix" => prefix = read_text_content(reader)?,
            _ => skip_element(reader)?,
        }
        Ok(())
    })?;
    Ok(prefix)
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

impl S3Deserialize for ServiceError {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut code = None;
        let mut message = None;
        let mut bucket_name = None;
        let mut resource = None;
        let mut request_id = None;
        let mut host_id = None;

        read_children(reader, "Error", |reader, tag| {
            match tag {
                "Code" => code = Some(read_text_content(reader)?),
                "Message" => message = Some(read_text_content(reader)?),
                "BucketName" => bucket_name = Some(read_text_content(reader)?),
                "Resource" => resource = Some(read_text_content(reader)?),
                "RequestId" => request_id = Some(read_text_content(reader)?),
                "HostId" => host_id = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;

        let code = code.ok_or_else(|| XmlError::MissingElement("Code".to_owned()))?;
        let mut err = ServiceError::new(ErrorCode::from(code.as_str()));
        if let Some(message) = message {
            err.message = message;
        }
        err.bucket_name = bucket_name;
        err.resource = resource;
        err.request_id = request_id;
        err.host_id = host_id;
        Ok(err)
    }
}

impl S3Deserialize for Owner {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut owner = Owner::default();
        read_children(reader, "Owner", |reader, tag| {
            match tag {
                "ID" => owner.id = read_text_content(reader)?,
                "DisplayName" => owner.display_name = read_text_content(reader)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(owner)
    }
}

impl S3Deserialize for ListEntry {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut key = None;
        let mut last_modified = None;
        let mut size = 0;
        let mut etag = String::new();
        let mut storage_class = None;
        let mut owner = None;

        read_children(reader, "Contents", |reader, tag| {
            match tag {
                "Key" => key = Some(read_text_content(reader)?),
                "LastModified" => last_modified = Some(parse_timestamp(&read_text_content(reader)?)?),
                "ETag" => etag = read_text_content(reader)?,
                "Size" => size = parse_u64(&read_text_content(reader)?)?,
                "StorageClass" => storage_class = Some(read_text_content(reader)?),
                "Owner" => owner = Some(Owner::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;

        Ok(ListEntry {
            key: key.ok_or_else(|| XmlError::MissingElement("Key".to_owned()))?,
            last_modified: last_modified.unwrap_or_default(),
            size,
            etag,
            storage_class: storage_class.unwrap_or_else(|| "STANDARD".to_owned()),
            owner,
        })
    }
}

impl S3Deserialize for ListPage {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut page = ListPage::default();
        read_children(reader, "ListBucketResult", |reader, tag| {
            match tag {
                "Name" => page.name = read_text_content(reader)?,
                "Prefix" => page.prefix = read_text_content(reader)?,
                "Delimiter" => page.delimiter = read_text_content(reader)?,
                "Marker" => page.marker = read_text_content(reader)?,
                "NextMarker" => page.next_marker = Some(read_text_content(reader)?),
                "MaxKeys" => page.max_keys = parse_u32(&read_text_content(reader)?)?,
                "IsTruncated" => page.is_truncated = parse_bool(&read_text_content(reader)?)?,
                "Contents" => page.contents.push(ListEntry::deserialize_xml(reader)?),
                "CommonPrefixes" => page.common_prefixes.push(read_common_prefix(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(page)
    }
}

impl S3Deserialize for Part {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut number = None;
        let mut etag = String::new();
        let mut size = 0;
        let mut last_modified = None;

        read_children(reader, "Part", |reader, tag| {
            match tag {
                "PartNumber" => number = Some(parse_u32(&read_text_content(reader)?)?),
                "ETag" => etag = read_text_content(reader)?,
                "Size" => size = parse_u64(&read_text_content(reader)?)?,
                "LastModified" => last_modified = Some(parse_timestamp(&read_text_content(reader)?)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;

        Ok(Part {
            number: number.ok_or_else(|| XmlError::MissingElement("PartNumber".to_owned()))?,
            etag,
            size,
            last_modified,
        })
    }
}

impl S3Deserialize for PartsPage {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut page = PartsPage::default();
        read_children(reader, "ListPartsResult", |reader, tag| {
            match tag {
                "Bucket" => page.bucket = read_text_content(reader)?,
                "Key" => page.key = read_text_content(reader)?,
                "UploadId" => page.upload_id = read_text_content(reader)?,
                "PartNumberMarker" => {
                    page.part_number_marker = parse_u32(&read_text_content(reader)?)?;
                }
                "NextPartNumberMarker" => {
                    page.next_part_number_marker = parse_u32(&read_text_content(reader)?)?;
                }
                "MaxParts" => page.max_parts = parse_u32(&read_text_content(reader)?)?,
                "IsTruncated" => page.is_truncated = parse_bool(&read_text_content(reader)?)?,
                "Part" => page.parts.push(Part::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(page)
    }
}

impl S3Deserialize for UploadEntry {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut key = None;
        let mut upload_id = None;
        let mut initiated = None;

        read_children(reader, "Upload", |reader, tag| {
            match tag {
                "Key" => key = Some(read_text_content(reader)?),
                "UploadId" => upload_id = Some(read_text_content(reader)?),
                "Initiated" => initiated = Some(parse_timestamp(&read_text_content(reader)?)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;

        Ok(UploadEntry {
            key: key.ok_or_else(|| XmlError::MissingElement("Key".to_owned()))?,
            upload_id: upload_id.ok_or_else(|| XmlError::MissingElement("UploadId".to_owned()))?,
            initiated,
        })
    }
}

impl S3Deserialize for UploadsPage {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut page = UploadsPage::default();
        read_children(reader, "ListMultipartUploadsResult", |reader, tag| {
            match tag {
                "Bucket" => page.bucket = read_text_content(reader)?,
                "KeyMarker" => page.key_marker = read_text_content(reader)?,
                "UploadIdMarker" => page.upload_id_marker = read_text_content(reader)?,
                "NextKeyMarker" => page.next_key_marker = read_text_content(reader)?,
                "NextUploadIdMarker" => page.next_upload_id_marker = read_text_content(reader)?,
                "Prefix" => page.prefix = read_text_content(reader)?,
                "Delimiter" => page.delimiter = read_text_content(reader)?,
                "MaxUploads" => page.max_uploads = parse_u32(&read_text_content(reader)?)?,
                "IsTruncated" => page.is_truncated = parse_bool(&read_text_content(reader)?)?,
                "Upload" => page.uploads.push(UploadEntry::deserialize_xml(reader)?),
                "CommonPrefixes" => page.common_prefixes.push(read_common_prefix(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(page)
    }
}

impl S3Deserialize for InitiateMultipartResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = InitiateMultipartResult::default();
        read_children(reader, "InitiateMultipartUploadResult", |reader, tag| {
            match tag {
                "Bucket" => result.bucket = read_text_content(reader)?,
                "Key" => result.key = read_text_content(reader)?,
                "UploadId" => result.upload_id = read_text_content(reader)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        if result.upload_id.is_empty() {
            return Err(XmlError::MissingElement("UploadId".to_owned()));
        }
        Ok(result)
    }
}

impl S3Deserialize for CompleteMultipartResult {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut result = CompleteMultipartResult::default();
        read_children(reader, "CompleteMultipartUploadResult", |reader, tag| {
            match tag {
                "Location" => result.location = read_text_content(reader)?,
                "Bucket" => result.bucket = read_text_content(reader)?,
                "Key" => result.key = read_text_content(reader)?,
                "ETag" => result.etag = read_text_content(reader)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

impl S3Deserialize for CompletedPart {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut number = None;
        let mut etag = None;
        read_children(reader, "Part", |reader, tag| {
            match tag {
                "PartNumber" => number = Some(parse_u32(&read_text_content(reader)?)?),
                "ETag" => etag = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(CompletedPart {
            number: number.ok_or_else(|| XmlError::MissingElement("PartNumber".to_owned()))?,
            etag: etag.ok_or_else(|| XmlError::MissingElement("ETag".to_owned()))?,
        })
    }
}

impl S3Deserialize for CompleteMultipartUpload {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut manifest = CompleteMultipartUpload::default();
        read_children(reader, "CompleteMultipartUpload", |reader, tag| {
            match tag {
                "Part" => manifest.parts.push(CompletedPart::deserialize_xml(reader)?),
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(manifest)
    }
}

impl S3Deserialize for CreateBucketConfiguration {
    fn deserialize_xml(reader: &mut Reader<&[u8]>) -> Result<Self, XmlError> {
        let mut config = CreateBucketConfiguration::default();
        read_children(reader, "CreateBucketConfiguration", |reader, tag| {
            match tag {
                "LocationConstraint" => config.location_constraint = read_text_content(reader)?,
                _ => skip_element(reader)?,
            }
            Ok(())
        })?;
        Ok(config)
    }
}
