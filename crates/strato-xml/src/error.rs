//! XML error type and the `<Error>` document.

use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};
use strato_model::ServiceError;

/// Errors that can occur during XML serialization or deserialization.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// An I/O error during XML writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// A required XML element was missing.
    #[error("missing required XML element: {0}")]
    MissingElement(String),

    /// An unexpected XML element was encountered.
    #[error("unexpected XML element: {0}")]
    UnexpectedElement(String),

    /// An error parsing a value from XML text content.
    #[error("failed to parse value: {0}")]
    ParseError(String),
}

/// Format a service error as a flat `<Error>` document.
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Error>
///   <Code>NoSuchBucket</Code>
///   <Message>The specified bucket does not exist</Message>
///   <BucketName>mybucket</BucketName>
///   <RequestId>tx00000...</RequestId>
/// </Error>
/// ```
#[must_use]
pub fn error_to_xml(err: &ServiceError) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_error_xml(&mut buf, err) {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

fn write_error_xml(buf: &mut Vec<u8>, err: &ServiceError) -> io::Result<()> {
    let mut writer = Writer::new(buf);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    writer.create_element("Error").write_inner_content(|w| {
        w.create_element("Code")
            .write_text_content(BytesText::new(err.code.as_str()))?;
        w.create_element("Message")
            .write_text_content(BytesText::new(&err.message))?;
        for (tag, value) in [
            ("BucketName", err.bucket_name.as_deref()),
            ("Resource", err.resource.as_deref()),
            ("RequestId", err.request_id.as_deref()),
            ("HostId", err.host_id.as_deref()),
        ] {
            if let Some(value) = value {
                w.create_element(tag)
                    .write_text_content(BytesText::new(value))?;
            }
        }
        Ok(())
    })?;

    Ok(())
}
