use super::{BlockMetadataV2, ITaikoInbox};
use alloy_primitives::{Bytes, Log, B256};
use alloy_sol_types::SolEvent;
use taiko_primitives::{BlockParams, OntakeMetadata, PacayaMetadata, ProposalMetadata};

/// Tries to decode the provided log into the type T.
pub fn try_decode_log<T: SolEvent>(log: &Log) -> Option<Log<T>> {
    T::decode_log(log).ok()
}

/// Returns the signatures of the proposal events of both forks, to filter L1 logs with.
pub const fn proposal_event_signatures() -> [B256; 2] {
    [ITaikoInbox::BlockProposedV2::SIGNATURE_HASH, ITaikoInbox::BatchProposed::SIGNATURE_HASH]
}

/// Decodes a `BlockProposedV2` or `BatchProposed` log into the proposal metadata, stamped with the
/// L1 block which emitted it. Returns `None` for any other log.
pub fn decode_proposal(log: &alloy_rpc_types_eth::Log) -> Option<ProposalMetadata> {
    let raw_block_height = log.block_number.unwrap_or_default();
    let raw_block_hash = log.block_hash.unwrap_or_default();

    let topic = log.topic0().copied()?;
    if topic == ITaikoInbox::BlockProposedV2::SIGNATURE_HASH {
        let event = try_decode_log::<ITaikoInbox::BlockProposedV2>(&log.inner)?;
        return Some(ontake_metadata(event.data.meta, raw_block_height, raw_block_hash).into());
    }
    if topic != ITaikoInbox::BatchProposed::SIGNATURE_HASH {
        return None;
    }

    let event = try_decode_log::<ITaikoInbox::BatchProposed>(&log.inner)?.data;
    let info = event.info;
    Some(
        PacayaMetadata {
            batch_id: event.meta.batchId,
            last_block_id: info.lastBlockId,
            last_block_timestamp: info.lastBlockTimestamp,
            blocks: info
                .blocks
                .into_iter()
                .map(|block| BlockParams {
                    num_transactions: block.numTransactions,
                    time_shift: block.timeShift,
                    signal_slots: block.signalSlots,
                })
                .collect(),
            blob_hashes: info.blobHashes,
            blob_created_in: info.blobCreatedIn,
            blob_byte_offset: info.blobByteOffset,
            blob_byte_size: info.blobByteSize,
            txs_hash: info.txsHash,
            coinbase: info.coinbase,
            extra_data: Bytes::copy_from_slice(info.extraData.as_slice()),
            gas_limit: info.gasLimit,
            anchor_block_id: info.anchorBlockId,
            anchor_block_hash: info.anchorBlockHash,
            base_fee_config: info.baseFeeConfig.into(),
            proposer: event.meta.proposer,
            proposed_in: info.proposedIn,
            raw_block_height,
            raw_block_hash,
        }
        .into(),
    )
}

fn ontake_metadata(
    meta: BlockMetadataV2,
    raw_block_height: u64,
    raw_block_hash: B256,
) -> OntakeMetadata {
    OntakeMetadata {
        block_id: meta.id,
        timestamp: meta.timestamp,
        difficulty: meta.difficulty,
        anchor_block_id: meta.anchorBlockId,
        anchor_block_hash: meta.anchorBlockHash,
        coinbase: meta.coinbase,
        extra_data: Bytes::copy_from_slice(meta.extraData.as_slice()),
        gas_limit: meta.gasLimit,
        blob_used: meta.blobUsed,
        blob_hash: meta.blobHash,
        blob_tx_list_offset: meta.blobTxListOffset,
        blob_tx_list_length: meta.blobTxListLength,
        base_fee_config: meta.baseFeeConfig.into(),
        proposer: meta.proposer,
        proposed_in: meta.proposedIn,
        raw_block_height,
        raw_block_hash,
    }
}

/// Decodes a `CalldataTxList` log, returning the Ontake block id and its transaction list.
pub fn decode_calldata_tx_list(log: &Log) -> Option<(u64, Bytes)> {
    let event = try_decode_log::<ITaikoInbox::CalldataTxList>(log)?.data;
    Some((event.blockId.saturating_to(), event.txList))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BaseFeeConfig, BatchInfo, BatchMetadata};
    use alloy_primitives::{address, b256, Address, U256};
    use arbitrary::{Arbitrary, Unstructured};
    use rand::Rng;

    const INBOX: Address = address!("0x06a9Ab27c7e2255df1815E6CC0168d7755Feb19a");

    fn rpc_log(inner: Log, number: u64, hash: B256) -> alloy_rpc_types_eth::Log {
        alloy_rpc_types_eth::Log {
            inner,
            block_number: Some(number),
            block_hash: Some(hash),
            ..Default::default()
        }
    }

    #[test]
    fn test_should_decode_batch_proposed() {
        // Given
        let info = BatchInfo {
            blocks: vec![
                crate::BlockParams { numTransactions: 2, timeShift: 0, signalSlots: vec![] },
                crate::BlockParams {
                    numTransactions: 1,
                    timeShift: 4,
                    signalSlots: vec![B256::repeat_byte(1)],
                },
            ],
            blobHashes: vec![B256::repeat_byte(2)],
            extraData: B256::repeat_byte(3),
            gasLimit: 240_000_000,
            lastBlockId: 12,
            lastBlockTimestamp: 1_000,
            anchorBlockId: 99,
            baseFeeConfig: BaseFeeConfig { sharingPctg: 50, ..Default::default() },
            ..Default::default()
        };
        let meta = BatchMetadata { batchId: 7, proposer: address!("0x0000000000000000000000000000000000000abc"), ..Default::default() };
        let event = ITaikoInbox::BatchProposed { info, meta, txList: Bytes::new() };
        let hash = b256!("0x00000000000000000000000000000000000000000000000000000000000000aa");
        let log = rpc_log(Log { address: INBOX, data: event.encode_log_data() }, 100, hash);

        // When
        let decoded = decode_proposal(&log).unwrap();

        // Then
        let ProposalMetadata::Pacaya(meta) = decoded else { panic!("expected a Pacaya batch") };
        assert_eq!(meta.batch_id, 7);
        assert_eq!(meta.first_block_id(), 11);
        assert_eq!(meta.blocks[1].signal_slots, vec![B256::repeat_byte(1)]);
        assert_eq!(meta.extra_data.as_ref(), B256::repeat_byte(3).as_slice());
        assert_eq!(meta.base_fee_config.sharing_pctg, 50);
        assert_eq!(meta.raw_block_height, 100);
        assert_eq!(meta.raw_block_hash, hash);
    }

    #[test]
    fn test_should_decode_block_proposed_v2() {
        // Given
        let mut bytes = [0u8; 1024];
        rand::rng().fill(bytes.as_mut_slice());
        let meta = BlockMetadataV2::arbitrary(&mut Unstructured::new(&bytes)).unwrap();
        let event = ITaikoInbox::BlockProposedV2 { blockId: U256::from(meta.id), meta: meta.clone() };
        let log = rpc_log(Log { address: INBOX, data: event.encode_log_data() }, 5, B256::ZERO);

        // When
        let decoded = decode_proposal(&log).unwrap();

        // Then
        let ProposalMetadata::Ontake(decoded) = decoded else { panic!("expected an Ontake block") };
        assert_eq!(decoded.block_id, meta.id);
        assert_eq!(decoded.difficulty, meta.difficulty);
        assert_eq!(decoded.blob_tx_list_length, meta.blobTxListLength);
        assert_eq!(decoded.proposed_in, meta.proposedIn);
    }

    #[test]
    fn test_should_ignore_unrelated_log() {
        let event = ITaikoInbox::BatchesVerified { batchId: 1, blockHash: B256::ZERO };
        let log = rpc_log(Log { address: INBOX, data: event.encode_log_data() }, 1, B256::ZERO);

        assert!(decode_proposal(&log).is_none());
    }

    #[test]
    fn test_should_decode_calldata_tx_list() {
        let event = ITaikoInbox::CalldataTxList { blockId: U256::from(3), txList: Bytes::from_static(&[1, 2]) };
        let log = Log { address: INBOX, data: event.encode_log_data() };

        assert_eq!(decode_calldata_tx_list(&log), Some((3, Bytes::from_static(&[1, 2]))));
    }
}
