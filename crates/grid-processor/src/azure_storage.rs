//! Azure Blob storage backend for Zarr access.
//!
//! This module provides helper functions for creating SAS-authenticated
//! Azure Blob storage backends that work with the zarrs crate.

use std::sync::Arc;

// Use the direct object_store crate (version must match what zarrs_object_store uses)
use object_store::azure::{AzureConfigKey, MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::prefix::PrefixStore;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use crate::error::{GridProcessorError, Result};
use crate::processor::SourceDescriptor;

/// Blocking executor that works from within a tokio runtime.
///
/// Uses `tokio::task::block_in_place` to move the current task to a blocking
/// thread, then uses the runtime handle to drive the future. Requires the
/// multi-threaded runtime.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Configuration for connecting to an Azure Blob container.
#[derive(Clone)]
pub struct AzureConfig {
    /// Account endpoint (e.g., "https://climatedataprod.blob.core.windows.net")
    pub endpoint: String,
    /// Container name
    pub container: String,
    /// Key prefix of the Zarr store inside the container (e.g., "snodas.zarr")
    pub prefix: String,
    /// Shared access signature query string
    pub sas_token: String,
}

impl AzureConfig {
    /// Build from a source descriptor. Fails when no credential is set.
    pub fn from_descriptor(source: &SourceDescriptor) -> Result<Self> {
        let sas_token = source
            .credential
            .as_deref()
            .map(|t| t.trim().trim_start_matches('?'))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GridProcessorError::MissingCredential(source.container.clone()))?;

        Ok(Self {
            endpoint: source.endpoint.trim_end_matches('/').to_string(),
            container: source.container.clone(),
            prefix: source.prefix.trim_matches('/').to_string(),
            sas_token: sas_token.to_string(),
        })
    }

    /// Container URL, e.g. `https://climatedataprod.blob.core.windows.net/snodas-v1`.
    pub fn container_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.container)
    }
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("container", &self.container)
            .field("prefix", &self.prefix)
            .field("sas_token", &"<redacted>")
            .finish()
    }
}

/// Storage type alias for Azure-backed Zarr access (async).
pub type AsyncAzureStorage = AsyncObjectStore<PrefixStore<MicrosoftAzure>>;

/// Storage type alias for Azure-backed Zarr access (sync adapter).
/// This type implements ReadableStorageTraits and can be opened with zarrs.
pub type AzureStorage = AsyncToSyncStorageAdapter<AsyncAzureStorage, TokioBlockOn>;

/// SAS-authenticated client for the configured container.
pub fn container_client(config: &AzureConfig) -> Result<MicrosoftAzure> {
    // `build()` applies the URL after every other option, so the container
    // must be the URL's first path segment or it is reset to empty.
    MicrosoftAzureBuilder::new()
        .with_url(config.container_url())
        .with_config(AzureConfigKey::SasKey, &config.sas_token)
        .build()
        .map_err(|e| {
            GridProcessorError::open_failed(format!("Failed to create Azure client: {}", e))
        })
}

/// Create an Azure Blob storage backend for Zarr access.
///
/// The container client is rooted at the Zarr prefix, so array paths such as
/// `/time` resolve to `<prefix>/time/...` inside the container.
pub fn create_azure_storage(config: &AzureConfig) -> Result<Arc<AzureStorage>> {
    let azure = container_client(config)?;

    let prefixed = PrefixStore::new(azure, config.prefix.as_str());
    let async_store = Arc::new(AsyncObjectStore::new(prefixed));

    // Wrap in async-to-sync adapter
    let sync_store = AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn);

    Ok(Arc::new(sync_store))
}
