//! The client handle.

use std::fmt;
use std::sync::Arc;

use strato_auth::Credentials;
use strato_model::region::Region;
use tokio_util::sync::CancellationToken;

use crate::bucket::Bucket;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::transport::{ReqwestTransport, Transport};

/// An S3 client bound to one set of credentials and one region.
///
/// Cloning is cheap and clones share the transport and the cancellation
/// token.
///
/// # Examples
///
/// ```no_run
/// use strato_auth::Credentials;
/// use strato_client::S3;
/// use strato_model::region::US_EAST_1;
///
/// # async fn run() -> Result<(), strato_client::Error> {
/// let s3 = S3::new(Credentials::from_env()?, US_EAST_1)?;
/// let bucket = s3.bucket("my-bucket");
/// bucket.put("hello.txt", "hello".into(), "text/plain", Default::default(), Default::default()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct S3 {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) credentials: Credentials,
    pub(crate) region: Region,
    pub(crate) config: ClientConfig,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) cancel: CancellationToken,
}

impl S3 {
    /// Create a client with the default configuration and HTTP transport.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be initialized.
    pub fn new(credentials: Credentials, region: Region) -> Result<Self, Error> {
        Self::with_config(credentials, region, ClientConfig::default())
    }

    /// Create a client with an explicit configuration and the default HTTP
    /// transport.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be initialized.
    pub fn with_config(
        credentials: Credentials,
        region: Region,
        config: ClientConfig,
    ) -> Result<Self, Error> {
        let transport = ReqwestTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(
            credentials,
            region,
            config,
            Arc::new(transport),
        ))
    }

    /// Create a client over a caller-supplied transport.
    #[must_use]
    pub fn with_transport(
        credentials: Credentials,
        region: Region,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                credentials,
                region,
                config,
                transport,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Replace the cancellation token.
    ///
    /// Cancelling `token` aborts every in-flight and future call of this
    /// client with [`Error::Cancelled`].
    #[must_use]
    pub fn with_cancellation(self, token: CancellationToken) -> Self {
        let inner = &self.inner;
        Self {
            inner: Arc::new(ClientInner {
                credentials: inner.credentials.clone(),
                region: inner.region.clone(),
                config: inner.config.clone(),
                transport: Arc::clone(&inner.transport),
                cancel: token,
            }),
        }
    }

    /// Cancel every in-flight and future call.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// The cancellation token calls race against.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// The region requests are addressed to.
    #[must_use]
    pub fn region(&self) -> &Region {
        &self.inner.region
    }

    /// The client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// The credentials requests are signed with.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    /// A handle on the named bucket. Nothing is sent.
    #[must_use]
    pub fn bucket(&self, name: impl Into<String>) -> Bucket {
        Bucket::new(self.clone(), name.into())
    }
}

impl fmt::Debug for S3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3")
            .field("region", &self.inner.region.name)
            .field("endpoint", &self.inner.region.endpoint)
            .field("signing_version", &self.inner.config.signing_version)
            .field("transport", &self.inner.transport)
            .finish_non_exhaustive()
    }
}
