//! Fetchers of the compressed transaction lists of the proposals, from calldata or blobs.

use crate::TxListFetchError;
use alloy_primitives::{Address, Bytes};
use alloy_rpc_types_eth::Filter;
use alloy_sol_types::SolEvent;
use taiko_codec::{decode_blob_data, slice_tx_list};
use taiko_l1::{decode_calldata_tx_list, try_decode_log, ITaikoInbox};
use taiko_primitives::ProposalMetadata;
use taiko_providers::{BlobProvider, L1ChainProvider};

/// Fetches the still compressed transaction list of a proposal.
#[async_trait::async_trait]
#[auto_impl::auto_impl(Arc, &)]
pub trait TxListFetcher: Sync + Send {
    /// Returns the transaction list of the proposal.
    async fn fetch(&self, meta: &ProposalMetadata) -> Result<Bytes, TxListFetchError>;
}

/// Fetches the transaction lists carried in the calldata of the proposal transactions, read back
/// from the events of the inbox.
#[derive(Debug, Clone)]
pub struct CalldataFetcher<L1> {
    l1: L1,
    inbox: Address,
}

impl<L1> CalldataFetcher<L1> {
    /// Returns a new [`CalldataFetcher`] reading the events of the inbox.
    pub const fn new(l1: L1, inbox: Address) -> Self {
        Self { l1, inbox }
    }
}

#[async_trait::async_trait]
impl<L1: L1ChainProvider> TxListFetcher for CalldataFetcher<L1> {
    async fn fetch(&self, meta: &ProposalMetadata) -> Result<Bytes, TxListFetchError> {
        if meta.blob_used() {
            return Err(TxListFetchError::BlobUsed)
        }

        let height = meta.raw_block_height();
        let not_found =
            TxListFetchError::CalldataNotFound { proposal_id: meta.proposal_id(), height };
        let filter = Filter::new().address(self.inbox).from_block(height).to_block(height);

        match meta {
            ProposalMetadata::Pacaya(meta) => {
                let filter = filter.event_signature(ITaikoInbox::BatchProposed::SIGNATURE_HASH);
                let event = self
                    .l1
                    .l1_logs(&filter)
                    .await?
                    .iter()
                    .filter_map(|log| try_decode_log::<ITaikoInbox::BatchProposed>(&log.inner))
                    .find(|event| event.data.meta.batchId == meta.batch_id)
                    .ok_or(not_found)?;
                let tx_list =
                    slice_tx_list(&event.data.txList, meta.blob_byte_offset, meta.blob_byte_size)?;
                Ok(Bytes::copy_from_slice(tx_list))
            }
            ProposalMetadata::Ontake(meta) => {
                let filter = filter.event_signature(ITaikoInbox::CalldataTxList::SIGNATURE_HASH);
                self.l1
                    .l1_logs(&filter)
                    .await?
                    .iter()
                    .filter_map(|log| decode_calldata_tx_list(&log.inner))
                    .find_map(|(block_id, tx_list)| (block_id == meta.block_id).then_some(tx_list))
                    .ok_or(not_found)
            }
        }
    }
}

/// Fetches the transaction lists carried in blobs.
#[derive(Debug, Clone)]
pub struct BlobFetcher<L1, B> {
    l1: L1,
    blobs: B,
}

impl<L1, B> BlobFetcher<L1, B> {
    /// Returns a new [`BlobFetcher`].
    pub const fn new(l1: L1, blobs: B) -> Self {
        Self { l1, blobs }
    }
}

#[async_trait::async_trait]
impl<L1: L1ChainProvider, B: BlobProvider> TxListFetcher for BlobFetcher<L1, B> {
    async fn fetch(&self, meta: &ProposalMetadata) -> Result<Bytes, TxListFetchError> {
        if !meta.blob_used() {
            return Err(TxListFetchError::BlobNotUsed)
        }

        let (height, hashes, offset, size) = match meta {
            ProposalMetadata::Pacaya(meta) => (
                meta.blob_origin_height(),
                meta.blob_hashes.clone(),
                meta.blob_byte_offset,
                meta.blob_byte_size,
            ),
            ProposalMetadata::Ontake(meta) => (
                meta.raw_block_height,
                vec![meta.blob_hash],
                meta.blob_tx_list_offset,
                meta.blob_tx_list_length,
            ),
        };
        let header = self
            .l1
            .l1_header_by_number(height.into())
            .await?
            .ok_or(TxListFetchError::MissingL1Header(height))?;

        let mut data = Vec::new();
        for hash in hashes {
            let blob = self
                .blobs
                .blob(header.timestamp, hash)
                .await?
                .ok_or(TxListFetchError::SidecarNotFound { hash })?;
            data.extend(decode_blob_data(&blob)?);
        }
        tracing::trace!(target: "taiko::driver", height, len = data.len(), "decoded blobs");

        Ok(Bytes::copy_from_slice(slice_tx_list(&data, offset, size)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};
    use taiko_codec::{encode_blob_data, CodecError};
    use taiko_primitives::{OntakeMetadata, PacayaMetadata};
    use taiko_providers::test_utils::{MockBlobProvider, MockL1Provider};

    const INBOX: Address = Address::repeat_byte(0x11);

    fn batch_proposed(batch_id: u64, tx_list: &[u8]) -> alloy_primitives::LogData {
        ITaikoInbox::BatchProposed {
            info: Default::default(),
            meta: taiko_l1::BatchMetadata { batchId: batch_id, ..Default::default() },
            txList: Bytes::copy_from_slice(tx_list),
        }
        .encode_log_data()
    }

    fn pacaya(batch_id: u64, height: u64, offset: u32, size: u32) -> ProposalMetadata {
        PacayaMetadata {
            batch_id,
            raw_block_height: height,
            blob_byte_offset: offset,
            blob_byte_size: size,
            ..Default::default()
        }
        .into()
    }

    #[tokio::test]
    async fn test_should_fetch_pacaya_calldata() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        let header = l1.push_block(vec![
            (INBOX, batch_proposed(1, &[9, 9, 9])),
            (INBOX, batch_proposed(2, &[1, 2, 3, 4, 5])),
        ]);
        let fetcher = CalldataFetcher::new(l1, INBOX);

        // When
        let tx_list = fetcher.fetch(&pacaya(2, header.number, 1, 3)).await?;

        // Then
        assert_eq!(tx_list, Bytes::from(vec![2, 3, 4]));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fail_on_missing_calldata() -> eyre::Result<()> {
        let l1 = MockL1Provider::new();
        let header = l1.push_block(vec![(INBOX, batch_proposed(1, &[1]))]);
        let fetcher = CalldataFetcher::new(l1, INBOX);

        let result = fetcher.fetch(&pacaya(3, header.number, 0, 1)).await;

        assert!(matches!(
            result,
            Err(TxListFetchError::CalldataNotFound { proposal_id: 3, height }) if height == header.number
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_fail_on_out_of_bounds_slice() -> eyre::Result<()> {
        let l1 = MockL1Provider::new();
        let header = l1.push_block(vec![(INBOX, batch_proposed(1, &[1, 2]))]);
        let fetcher = CalldataFetcher::new(l1, INBOX);

        let result = fetcher.fetch(&pacaya(1, header.number, 1, 2)).await;

        assert!(matches!(result, Err(TxListFetchError::Codec(CodecError::OutOfBounds { .. }))));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_fetch_ontake_calldata() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        let log = ITaikoInbox::CalldataTxList { blockId: U256::from(5), txList: Bytes::from(vec![7, 7]) }
            .encode_log_data();
        let header = l1.push_block(vec![(INBOX, log)]);
        let meta: ProposalMetadata =
            OntakeMetadata { block_id: 5, raw_block_height: header.number, ..Default::default() }.into();

        // When
        let tx_list = CalldataFetcher::new(l1, INBOX).fetch(&meta).await?;

        // Then
        assert_eq!(tx_list, Bytes::from(vec![7, 7]));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_concatenate_blobs() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        let header = l1.push_block(vec![]);
        let blobs = MockBlobProvider::default();
        let hashes = [B256::repeat_byte(1), B256::repeat_byte(2)];
        blobs.insert(hashes[0], encode_blob_data(&[1, 2, 3])?);
        blobs.insert(hashes[1], encode_blob_data(&[4, 5])?);
        let meta: ProposalMetadata = PacayaMetadata {
            blob_hashes: hashes.to_vec(),
            blob_created_in: header.number,
            blob_byte_offset: 2,
            blob_byte_size: 2,
            ..Default::default()
        }
        .into();

        // When
        let tx_list = BlobFetcher::new(l1, blobs).fetch(&meta).await?;

        // Then
        assert_eq!(tx_list, Bytes::from(vec![3, 4]));

        Ok(())
    }

    #[tokio::test]
    async fn test_should_report_missing_sidecar() -> eyre::Result<()> {
        let l1 = MockL1Provider::new();
        let hash = B256::repeat_byte(3);
        let meta: ProposalMetadata =
            PacayaMetadata { blob_hashes: vec![hash], blob_byte_size: 1, ..Default::default() }.into();

        let result = BlobFetcher::new(l1, MockBlobProvider::default()).fetch(&meta).await;

        assert!(matches!(result, Err(TxListFetchError::SidecarNotFound { hash: h }) if h == hash));
        Ok(())
    }

    #[tokio::test]
    async fn test_should_reject_wrong_source() -> eyre::Result<()> {
        let l1 = MockL1Provider::new();
        let blob_meta: ProposalMetadata =
            PacayaMetadata { blob_hashes: vec![B256::ZERO], ..Default::default() }.into();

        let calldata = CalldataFetcher::new(l1.clone(), INBOX).fetch(&blob_meta).await;
        let blob = BlobFetcher::new(l1, MockBlobProvider::default()).fetch(&pacaya(1, 0, 0, 0)).await;

        assert!(matches!(calldata, Err(TxListFetchError::BlobUsed)));
        assert!(matches!(blob, Err(TxListFetchError::BlobNotUsed)));
        Ok(())
    }
}
