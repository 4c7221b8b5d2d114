use crate::{BlobProvider, L1ProviderError};
use alloy_eips::eip4844::{kzg_to_versioned_hash, Blob};
use alloy_primitives::B256;
use alloy_rpc_types_beacon::sidecar::BeaconBlobBundle;
use lru::LruCache;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{num::NonZeroUsize, sync::Arc};
use tokio::sync::Mutex;

/// The default number of blobs kept in the provider cache.
pub const DEFAULT_BLOB_CACHE_SIZE: usize = 100;

const SPEC_PATH: &str = "eth/v1/config/spec";
const GENESIS_PATH: &str = "eth/v1/beacon/genesis";
const BLOB_SIDECARS_PATH: &str = "eth/v1/beacon/blob_sidecars";

#[derive(Debug, serde::Deserialize)]
struct BeaconResponse<T> {
    data: T,
}

#[derive(Debug, serde::Deserialize)]
struct GenesisData {
    #[serde(with = "alloy_serde::quantity")]
    genesis_time: u64,
}

#[derive(Debug, serde::Deserialize)]
struct SpecData {
    #[serde(rename = "SECONDS_PER_SLOT", with = "alloy_serde::quantity")]
    seconds_per_slot: u64,
}

/// The Beacon chain timing, mapping L1 block timestamps to slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeaconTiming {
    /// The Beacon chain genesis timestamp.
    pub genesis_timestamp: u64,
    /// The duration of a slot in seconds.
    pub seconds_per_slot: u64,
}

impl BeaconTiming {
    /// Returns the slot of the L1 block with the provided timestamp.
    pub const fn slot(&self, block_timestamp: u64) -> Result<u64, L1ProviderError> {
        if block_timestamp < self.genesis_timestamp {
            return Err(L1ProviderError::InvalidBlockTimestamp(
                self.genesis_timestamp,
                block_timestamp,
            ));
        }
        Ok((block_timestamp - self.genesis_timestamp) / self.seconds_per_slot)
    }
}

/// A [`BlobProvider`] reading blob sidecars from a Beacon node. All the sidecars of a fetched slot
/// are cached, since the blobs of a proposal are usually requested one after the other.
#[derive(Debug, Clone)]
pub struct BeaconClientProvider {
    base: String,
    client: Client,
    timing: BeaconTiming,
    cache: Arc<Mutex<LruCache<B256, Arc<Blob>>>>,
}

impl BeaconClientProvider {
    /// Connects to the Beacon node at the provided url and reads its timing.
    pub async fn new_http(base: reqwest::Url, cache_size: usize) -> Result<Self, L1ProviderError> {
        let base = base.as_str().trim_end_matches('/').to_string();
        let cache_size = NonZeroUsize::new(cache_size)
            .ok_or(L1ProviderError::Other("blob cache requires non-zero capacity"))?;
        let client = Client::new();

        let spec: SpecData = get(&client, &base, SPEC_PATH).await?;
        let genesis: GenesisData = get(&client, &base, GENESIS_PATH).await?;
        if spec.seconds_per_slot == 0 {
            return Err(L1ProviderError::Other("beacon node reported a zero slot duration"));
        }
        let timing = BeaconTiming {
            genesis_timestamp: genesis.genesis_time,
            seconds_per_slot: spec.seconds_per_slot,
        };
        tracing::info!(target: "taiko::providers", base, ?timing, "connected to beacon node");

        Ok(Self::with_timing(base, client, timing, cache_size))
    }

    fn with_timing(
        base: String,
        client: Client,
        timing: BeaconTiming,
        cache_size: NonZeroUsize,
    ) -> Self {
        Self { base, client, timing, cache: Arc::new(Mutex::new(LruCache::new(cache_size))) }
    }

    /// Returns the Beacon chain timing.
    pub const fn timing(&self) -> BeaconTiming {
        self.timing
    }
}

async fn get<T: DeserializeOwned>(client: &Client, base: &str, path: &str) -> Result<T, reqwest::Error> {
    let response = client.get(format!("{base}/{path}")).send().await?.error_for_status()?;
    Ok(response.json::<BeaconResponse<T>>().await?.data)
}

#[async_trait::async_trait]
impl BlobProvider for BeaconClientProvider {
    async fn blob(
        &self,
        block_timestamp: u64,
        hash: B256,
    ) -> Result<Option<Arc<Blob>>, L1ProviderError> {
        if let Some(blob) = self.cache.lock().await.get(&hash) {
            return Ok(Some(blob.clone()));
        }

        let slot = self.timing.slot(block_timestamp)?;
        tracing::trace!(target: "taiko::providers", slot, ?hash, "fetching blob sidecars");
        let url = format!("{}/{}/{}", self.base, BLOB_SIDECARS_PATH, slot);
        let bundle = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<BeaconBlobBundle>()
            .await?;

        let mut found = None;
        let mut cache = self.cache.lock().await;
        for sidecar in bundle.data {
            let versioned_hash = kzg_to_versioned_hash(sidecar.kzg_commitment.as_slice());
            let blob = Arc::new(*sidecar.blob);
            if versioned_hash == hash {
                found = Some(blob.clone());
            }
            cache.put(versioned_hash, blob);
        }

        if found.is_none() {
            tracing::debug!(target: "taiko::providers", slot, ?hash, "blob not found in slot sidecars");
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> BeaconClientProvider {
        BeaconClientProvider::with_timing(
            "http://localhost:5052".to_string(),
            Client::new(),
            BeaconTiming { genesis_timestamp: 0, seconds_per_slot: 12 },
            NonZeroUsize::MIN,
        )
    }

    #[test]
    fn test_should_derive_slot_from_timestamp() {
        let timing = BeaconTiming { genesis_timestamp: 1_606_824_023, seconds_per_slot: 12 };

        assert_eq!(timing.slot(1_606_824_023).unwrap(), 0);
        assert_eq!(timing.slot(1_606_824_023 + 12 * 42 + 11).unwrap(), 42);
    }

    #[test]
    fn test_should_reject_timestamp_before_genesis() {
        let timing = BeaconTiming { genesis_timestamp: 1_000, seconds_per_slot: 12 };

        assert!(matches!(timing.slot(999), Err(L1ProviderError::InvalidBlockTimestamp(1_000, 999))));
    }

    #[tokio::test]
    async fn test_should_serve_blob_from_cache() -> eyre::Result<()> {
        // Given
        let provider = provider();
        let hash = B256::repeat_byte(1);
        let blob = Arc::new(Blob::repeat_byte(2));
        provider.cache.lock().await.put(hash, blob.clone());

        // When
        let cached = provider.blob(0, hash).await?;

        // Then
        assert_eq!(cached, Some(blob));

        Ok(())
    }

    #[test]
    fn test_should_decode_beacon_responses() {
        let genesis: BeaconResponse<GenesisData> =
            serde_json::from_str(r#"{"data":{"genesis_time":"1606824023","genesis_fork_version":"0x00000000"}}"#)
                .unwrap();
        let spec: BeaconResponse<SpecData> =
            serde_json::from_str(r#"{"data":{"SECONDS_PER_SLOT":"12","SLOTS_PER_EPOCH":"32"}}"#).unwrap();

        assert_eq!(genesis.data.genesis_time, 1_606_824_023);
        assert_eq!(spec.data.seconds_per_slot, 12);
    }
}
