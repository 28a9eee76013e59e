//! The RPC seam between the engine and the object-management service.
//!
//! [`Transport`] is the only capability the engine consumes: two batched
//! calls that return per-request results in request order. [`GrpcTransport`]
//! implements it over a tonic [`Channel`]; tests substitute an in-memory
//! implementation.

use core::fmt;
use tonic::{
    Status,
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};
use viewer_bench_core::{
    Error, Result,
    proto::{
        SetObjectPositionSequenceRequest, SpawnObjectSequenceRequest,
        manage_object_service_client::ManageObjectServiceClient,
    },
    types::{CreationPayload, CreationReceipt, MutationPayload, MutationReceipt},
};

/// Batched access to the object-management service.
///
/// Both calls resolve once the whole batch has been answered. Implementations
/// must return exactly one receipt per payload, in payload order, or an
/// error; the dispatcher rejects any other cardinality.
pub trait Transport {
    fn send_creation_batch(
        &mut self,
        batch: Vec<CreationPayload>,
    ) -> impl Future<Output = core::result::Result<Vec<CreationReceipt>, Status>> + Send;

    fn send_mutation_batch(
        &mut self,
        batch: Vec<MutationPayload>,
    ) -> impl Future<Output = core::result::Result<Vec<MutationReceipt>, Status>> + Send;
}

/// Message compression negotiated with the service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Gzip => write!(f, "gzip"),
            Self::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

/// [`Transport`] over the generated `ManageObjectService` client.
#[derive(Clone, Debug)]
pub struct GrpcTransport {
    client: ManageObjectServiceClient<Channel>,
}

impl GrpcTransport {
    /// Connects eagerly to `endpoint` (`host:port` or a full URI).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the address is malformed or the
    /// connection cannot be established.
    pub async fn connect(endpoint: &str, compression: Compression) -> Result<Self> {
        let uri = normalize_endpoint(endpoint);
        let connect_err = |source| Error::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        let channel = Endpoint::from_shared(uri)
            .map_err(connect_err)?
            .connect()
            .await
            .map_err(connect_err)?;

        Ok(Self::new(channel, compression))
    }

    pub fn new(channel: Channel, compression: Compression) -> Self {
        let mut client = ManageObjectServiceClient::new(channel);
        if let Some(encoding) = Option::<CompressionEncoding>::from(compression) {
            client = client
                .send_compressed(encoding)
                .accept_compressed(encoding);
        }
        Self { client }
    }
}

impl Transport for GrpcTransport {
    async fn send_creation_batch(
        &mut self,
        batch: Vec<CreationPayload>,
    ) -> core::result::Result<Vec<CreationReceipt>, Status> {
        let request = SpawnObjectSequenceRequest {
            requests: batch.into_iter().map(Into::into).collect(),
        };
        let response = self.client.spawn_object_sequence(request).await?;
        Ok(response
            .into_inner()
            .responses
            .into_iter()
            .map(CreationReceipt::from)
            .collect())
    }

    async fn send_mutation_batch(
        &mut self,
        batch: Vec<MutationPayload>,
    ) -> core::result::Result<Vec<MutationReceipt>, Status> {
        let request = SetObjectPositionSequenceRequest {
            requests: batch.into_iter().map(Into::into).collect(),
        };
        let response = self.client.set_object_position_sequence(request).await?;
        Ok(response
            .into_inner()
            .responses
            .into_iter()
            .map(MutationReceipt::from)
            .collect())
    }
}

/// Prefixes a bare `host:port` with `http://`; full URIs pass through.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_port_gets_http_scheme() {
        assert_eq!(normalize_endpoint("localhost:50051"), "http://localhost:50051");
        assert_eq!(
            normalize_endpoint("https://viewer.internal:443"),
            "https://viewer.internal:443"
        );
    }

    #[test]
    fn compression_maps_to_encoding() {
        assert_eq!(Option::<CompressionEncoding>::from(Compression::None), None);
        assert_eq!(
            Option::<CompressionEncoding>::from(Compression::Zstd),
            Some(CompressionEncoding::Zstd)
        );
        assert_eq!(Compression::Gzip.to_string(), "gzip");
    }

    #[tokio::test]
    async fn malformed_endpoint_is_a_connect_error() {
        let err = GrpcTransport::connect("not a uri", Compression::None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connect { .. }), "got {err:?}");
    }
}
