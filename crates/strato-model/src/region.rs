//! Region table and bucket addressing.
//!
//! A [`Region`] names a service location and says how buckets are addressed
//! there: path-style (`https://host/bucket/key`) through [`Region::endpoint`],
//! or domain-style (`https://bucket.host/key`) through the optional
//! [`Region::bucket_endpoint`] template containing `${bucket}`.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Placeholder substituted with the bucket name in domain-style templates.
pub const BUCKET_PLACEHOLDER: &str = "${bucket}";

/// A named service location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// Region identifier, also the SigV4 signing region.
    pub name: Cow<'static, str>,
    /// Path-style endpoint, without trailing slash.
    pub endpoint: Cow<'static, str>,
    /// Domain-style endpoint template, e.g. `https://${bucket}.s3.amazonaws.com`.
    #[serde(default)]
    pub bucket_endpoint: Option<Cow<'static, str>>,
    /// Whether bucket creation must send a `LocationConstraint`.
    #[serde(default)]
    pub location_constraint: bool,
    /// Whether bucket names are lowercased before use.
    #[serde(default)]
    pub lowercase_bucket: bool,
}

/// How a bucket is placed in a request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketAddressing {
    /// Bucket is the first path segment under this endpoint.
    Path(String),
    /// Bucket is part of the host; keys start at the root of this endpoint.
    Domain(String),
}

const fn aws(
    name: &'static str,
    endpoint: &'static str,
    location_constraint: bool,
    lowercase_bucket: bool,
) -> Region {
    Region {
        name: Cow::Borrowed(name),
        endpoint: Cow::Borrowed(endpoint),
        bucket_endpoint: None,
        location_constraint,
        lowercase_bucket,
    }
}

/// US East (N. Virginia).
pub const US_EAST_1: Region = aws("us-east-1", "https://s3.amazonaws.com", false, false);
/// US West (N. California).
pub const US_WEST_1: Region = aws("us-west-1", "https://s3-us-west-1.amazonaws.com", true, true);
/// US West (Oregon).
pub const US_WEST_2: Region = aws("us-west-2", "https://s3-us-west-2.amazonaws.com", true, true);
/// EU (Ireland).
pub const EU_WEST_1: Region = aws("eu-west-1", "https://s3-eu-west-1.amazonaws.com", true, true);
/// Asia Pacific (Singapore).
pub const AP_SOUTHEAST_1: Region = aws(
    "ap-southeast-1",
    "https://s3-ap-southeast-1.amazonaws.com",
    true,
    true,
);
/// Asia Pacific (Sydney).
pub const AP_SOUTHEAST_2: Region = aws(
    "ap-southeast-2",
    "https://s3-ap-southeast-2.amazonaws.com",
    true,
    true,
);
/// Asia Pacific (Tokyo).
pub const AP_NORTHEAST_1: Region = aws(
    "ap-northeast-1",
    "https://s3-ap-northeast-1.amazonaws.com",
    true,
    true,
);
/// South America (Sao Paulo).
pub const SA_EAST_1: Region = aws("sa-east-1", "https://s3-sa-east-1.amazonaws.com", true, true);

/// Every well-known region.
pub const ALL: [Region; 8] = [
    US_EAST_1,
    US_WEST_1,
    US_WEST_2,
    EU_WEST_1,
    AP_SOUTHEAST_1,
    AP_SOUTHEAST_2,
    AP_NORTHEAST_1,
    SA_EAST_1,
];

impl Default for Region {
    fn default() -> Self {
        US_EAST_1
    }
}

impl Region {
    /// Look up a well-known region by name.
    #[must_use]
    pub fn lookup(name: &str) -> Option<Self> {
        ALL.iter().find(|r| r.name == name).cloned()
    }

    /// A custom region, e.g. a local S3-compatible endpoint.
    ///
    /// ```
    /// use strato_model::region::Region;
    ///
    /// let local = Region::custom("local", "http://localhost:4566/");
    /// assert_eq!(local.endpoint, "http://localhost:4566");
    /// ```
    #[must_use]
    pub fn custom(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            name: Cow::Owned(name.into()),
            endpoint: Cow::Owned(endpoint.trim_end_matches('/').to_owned()),
            bucket_endpoint: None,
            location_constraint: false,
            lowercase_bucket: false,
        }
    }

    /// Use domain-style addressing with the given `${bucket}` template.
    #[must_use]
    pub fn with_bucket_endpoint(mut self, template: impl Into<String>) -> Self {
        let template: String = template.into();
        self.bucket_endpoint = Some(Cow::Owned(template.trim_end_matches('/').to_owned()));
        self
    }

    /// Require a `LocationConstraint` on bucket creation.
    #[must_use]
    pub fn with_location_constraint(mut self, required: bool) -> Self {
        self.location_constraint = required;
        self
    }

    /// The bucket name as it goes on the wire.
    #[must_use]
    pub fn bucket_name<'a>(&self, bucket: &'a str) -> Cow<'a, str> {
        if self.lowercase_bucket {
            Cow::Owned(bucket.to_lowercase())
        } else {
            Cow::Borrowed(bucket)
        }
    }

    /// Decide how `bucket` is addressed in this region.
    ///
    /// Domain-style is used only when a template exists and the name is a
    /// valid DNS label sequence; otherwise path-style.
    #[must_use]
    pub fn addressing(&self, bucket: &str) -> BucketAddressing {
        match &self.bucket_endpoint {
            Some(template) if !bucket.is_empty() && is_dns_compatible(bucket) => {
                BucketAddressing::Domain(template.replace(BUCKET_PLACEHOLDER, bucket))
            }
            _ => BucketAddressing::Path(self.endpoint.to_string()),
        }
    }
}

/// Whether a bucket name can be used as a host name label sequence.
#[must_use]
pub fn is_dns_compatible(bucket: &str) -> bool {
    if bucket.len() < 3 || bucket.len() > 63 {
        return false;
    }
    bucket.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    })
}
