use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ops, Bucket, BucketError};
use crate::encoding::{Hash, Identity, Manifest, Slice};
use crate::protocol::{BeforeInvoke, Bincode, Decode, Encode, Method, Protocol};

fn trace_hook(name: &'static str) -> Option<BeforeInvoke> {
    Some(Arc::new(move || {
        tracing::trace!(operation = name, "invoking remote bucket operation")
    }))
}

/// Builds [`RemoteBucket`]s from a shared set of payload codecs
///
/// One factory's worth of codecs serves any number of proxies against
/// different connections — one per peer bucket discovered on the network —
/// without re-specifying the wiring each time.
pub struct RemoteBucketFactory {
    unit_encoder: Arc<dyn Encode<()>>,
    size_decoder: Arc<dyn Decode<u64>>,
    identity_decoder: Arc<dyn Decode<Identity>>,
    manifest_encoder: Arc<dyn Encode<Manifest>>,
    manifest_list_decoder: Arc<dyn Decode<Vec<Manifest>>>,
    hash_list_decoder: Arc<dyn Decode<Vec<Hash>>>,
    slice_request_encoder: Arc<dyn Encode<(Manifest, Vec<Hash>)>>,
    slice_list_decoder: Arc<dyn Decode<Vec<Slice>>>,
    response_timeout: Duration,
}

impl RemoteBucketFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        unit_encoder: Arc<dyn Encode<()>>,
        size_decoder: Arc<dyn Decode<u64>>,
        identity_decoder: Arc<dyn Decode<Identity>>,
        manifest_encoder: Arc<dyn Encode<Manifest>>,
        manifest_list_decoder: Arc<dyn Decode<Vec<Manifest>>>,
        hash_list_decoder: Arc<dyn Decode<Vec<Hash>>>,
        slice_request_encoder: Arc<dyn Encode<(Manifest, Vec<Hash>)>>,
        slice_list_decoder: Arc<dyn Decode<Vec<Slice>>>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            unit_encoder,
            size_decoder,
            identity_decoder,
            manifest_encoder,
            manifest_list_decoder,
            hash_list_decoder,
            slice_request_encoder,
            slice_list_decoder,
            response_timeout,
        }
    }

    /// The stock wiring: every payload through [`Bincode`]
    pub fn bincode(response_timeout: Duration) -> Self {
        let codec = Arc::new(Bincode);
        Self::new(
            codec.clone(),
            codec.clone(),
            codec.clone(),
            codec.clone(),
            codec.clone(),
            codec.clone(),
            codec.clone(),
            codec,
            response_timeout,
        )
    }

    /// Wrap a connected, already-authenticated protocol in a bucket proxy
    pub fn create_from(&self, protocol: Arc<dyn Protocol>) -> RemoteBucket {
        RemoteBucket {
            get_current_size: Method::new(
                protocol.clone(),
                ops::GET_CURRENT_SIZE,
                self.unit_encoder.clone(),
                self.size_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_CURRENT_SIZE),
            ),
            get_max_size: Method::new(
                protocol.clone(),
                ops::GET_MAX_SIZE,
                self.unit_encoder.clone(),
                self.size_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_MAX_SIZE),
            ),
            get_owner_identity: Method::new(
                protocol.clone(),
                ops::GET_OWNER_IDENTITY,
                self.unit_encoder.clone(),
                self.identity_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_OWNER_IDENTITY),
            ),
            get_pool_identity: Method::new(
                protocol.clone(),
                ops::GET_POOL_IDENTITY,
                self.unit_encoder.clone(),
                self.identity_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_POOL_IDENTITY),
            ),
            get_self_identity: Method::new(
                protocol.clone(),
                ops::GET_SELF_IDENTITY,
                self.unit_encoder.clone(),
                self.identity_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_SELF_IDENTITY),
            ),
            get_manifests: Method::new(
                protocol.clone(),
                ops::GET_MANIFESTS,
                self.unit_encoder.clone(),
                self.manifest_list_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_MANIFESTS),
            ),
            get_hashes: Method::new(
                protocol.clone(),
                ops::GET_HASHES,
                self.manifest_encoder.clone(),
                self.hash_list_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_HASHES),
            ),
            get_slices: Method::new(
                protocol,
                ops::GET_SLICES,
                self.slice_request_encoder.clone(),
                self.slice_list_decoder.clone(),
                self.response_timeout,
                trace_hook(ops::GET_SLICES),
            ),
        }
    }
}

/// The remote side of a networked bucket
///
/// Holds one typed [`Method`] per bucket operation and delegates each call
/// to the matching invoker. Stateless apart from the underlying connection;
/// share it freely across tasks once constructed.
pub struct RemoteBucket {
    get_current_size: Method<(), u64>,
    get_max_size: Method<(), u64>,
    get_owner_identity: Method<(), Identity>,
    get_pool_identity: Method<(), Identity>,
    get_self_identity: Method<(), Identity>,
    get_manifests: Method<(), Vec<Manifest>>,
    get_hashes: Method<Manifest, Vec<Hash>>,
    get_slices: Method<(Manifest, Vec<Hash>), Vec<Slice>>,
}

#[async_trait]
impl Bucket for RemoteBucket {
    async fn max_size(&self) -> Result<u64, BucketError> {
        Ok(self.get_max_size.invoke(&()).await?)
    }

    async fn current_size(&self) -> Result<u64, BucketError> {
        Ok(self.get_current_size.invoke(&()).await?)
    }

    async fn owner_identity(&self) -> Result<Identity, BucketError> {
        Ok(self.get_owner_identity.invoke(&()).await?)
    }

    async fn pool_identity(&self) -> Result<Identity, BucketError> {
        Ok(self.get_pool_identity.invoke(&()).await?)
    }

    async fn self_identity(&self) -> Result<Identity, BucketError> {
        Ok(self.get_self_identity.invoke(&()).await?)
    }

    async fn manifests(&self) -> Result<Vec<Manifest>, BucketError> {
        Ok(self.get_manifests.invoke(&()).await?)
    }

    async fn hashes(&self, manifest: &Manifest) -> Result<Vec<Hash>, BucketError> {
        Ok(self.get_hashes.invoke(manifest).await?)
    }

    async fn slices(
        &self,
        manifest: &Manifest,
        hashes: &[Hash],
    ) -> Result<Vec<Slice>, BucketError> {
        let request = (*manifest, hashes.to_vec());
        Ok(self.get_slices.invoke(&request).await?)
    }
}
