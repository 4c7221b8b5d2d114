use crate::{Envelope, PreconfError};
use alloy_consensus::{Transaction, TxEnvelope};
use alloy_primitives::{Address, Bytes, FixedBytes, Signature, B256, U256};
use alloy_rpc_types_engine::ExecutionPayloadV1;
use alloy_rpc_types_eth::Header;
use taiko_codec::decode_tx_list;
use taiko_l1::AnchorCall;
use taiko_primitives::{pacaya_difficulty, BaseFeeConfig, ANCHOR_V3_GAS_LIMIT};

/// The data needed to execute a preconfirmation block.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutableData {
    /// The parent block hash.
    pub parent_hash: B256,
    /// The fee recipient of the block.
    pub fee_recipient: Address,
    /// The block number.
    #[serde(rename = "blockNumber")]
    pub number: u64,
    /// The gas limit of the block.
    pub gas_limit: u64,
    /// The timestamp of the block.
    pub timestamp: u64,
    /// The transaction lists of the block, each RLP encoded then zlib compressed.
    pub transactions: Vec<Bytes>,
    /// The extra data of the block.
    pub extra_data: Bytes,
    /// The base fee of the block.
    pub base_fee_per_gas: u64,
    /// The expected hash of the block, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
}

/// The body of a request building a preconfirmation block.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildPreconfBlockRequest {
    /// The data of the block to execute.
    pub executable_data: Option<ExecutableData>,
    /// The 65 bytes signature of the preconfirmation.
    pub signature: Option<Bytes>,
    /// The L1 block anchored by the block.
    #[serde(rename = "anchorBlockID")]
    pub anchor_block_id: u64,
    /// The state root of the anchored L1 block.
    pub anchor_state_root: B256,
    /// The input of the anchor.
    pub anchor_input: B256,
    /// The signal slots relayed by the anchor transaction.
    pub signal_slots: Vec<B256>,
    /// The base fee configuration of the protocol.
    pub base_fee_config: BaseFeeConfig,
    /// Whether the block closes the current sequencing window.
    pub end_of_sequencing: bool,
    /// Whether the block is a forced inclusion.
    pub is_forced_inclusion: bool,
}

impl BuildPreconfBlockRequest {
    /// Decodes the request from its JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self, PreconfError> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// The response to a successful preconfirmation block request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPreconfBlockResponse {
    /// The header of the inserted block.
    pub block_header: Header,
}

/// The preconfirmation status of the node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreconfStatus {
    /// The number of envelopes cached since startup.
    pub total_cached: u64,
    /// The highest preconfirmation block received.
    #[serde(rename = "highestUnsafeL2PayloadBlockID")]
    pub highest_unsafe_l2_payload_block_id: u64,
}

/// Validates the preconfirmation requests before any block is built from them.
#[derive(Debug, Clone, Copy)]
pub struct PreconfValidator {
    /// The first block of the Pacaya fork.
    pub pacaya_fork_height: u64,
    /// The address of the anchor contract.
    pub anchor: Address,
    /// The maximum size of a compressed transaction list.
    pub max_tx_list_bytes: usize,
}

impl PreconfValidator {
    /// Validates the request, returning the envelope of the block to build.
    pub fn validate(&self, request: &BuildPreconfBlockRequest) -> Result<Envelope, PreconfError> {
        let data = request.executable_data.as_ref().ok_or(PreconfError::MissingExecutableData)?;

        if data.number < self.pacaya_fork_height {
            return Err(PreconfError::PreForkBlock {
                number: data.number,
                fork_height: self.pacaya_fork_height,
            });
        }
        if data.timestamp == 0 {
            return Err(PreconfError::MissingField("timestamp"));
        }
        if data.fee_recipient == Address::ZERO {
            return Err(PreconfError::MissingField("feeRecipient"));
        }
        if data.gas_limit == 0 {
            return Err(PreconfError::MissingField("gasLimit"));
        }
        if data.base_fee_per_gas == 0 {
            return Err(PreconfError::MissingField("baseFeePerGas"));
        }
        if data.extra_data.is_empty() {
            return Err(PreconfError::MissingField("extraData"));
        }
        if request.anchor_block_id == 0 {
            return Err(PreconfError::MissingField("anchorBlockID"));
        }
        if request.anchor_state_root == B256::ZERO {
            return Err(PreconfError::MissingField("anchorStateRoot"));
        }

        let [tx_list] = data.transactions.as_slice() else {
            return Err(PreconfError::TransactionCount(data.transactions.len()));
        };
        if tx_list.len() > self.max_tx_list_bytes {
            return Err(PreconfError::TxListTooLarge {
                size: tx_list.len(),
                max: self.max_tx_list_bytes,
            });
        }
        let txs = decode_tx_list(tx_list)?;
        let anchor = txs.first().ok_or(PreconfError::MissingAnchor)?;
        self.validate_anchor(anchor, request)?;

        let signature = request.signature.as_ref().map(|sig| parse_signature(sig)).transpose()?;

        tracing::debug!(
            target: "taiko::preconf",
            number = data.number,
            parent = ?data.parent_hash,
            transactions = txs.len(),
            coinbase = ?data.fee_recipient,
            "validated preconfirmation request"
        );

        Ok(Envelope {
            payload: ExecutionPayloadV1 {
                parent_hash: data.parent_hash,
                fee_recipient: data.fee_recipient,
                state_root: B256::ZERO,
                receipts_root: B256::ZERO,
                logs_bloom: Default::default(),
                prev_randao: pacaya_difficulty(data.number),
                block_number: data.number,
                gas_limit: data.gas_limit,
                gas_used: 0,
                timestamp: data.timestamp,
                extra_data: data.extra_data.clone(),
                base_fee_per_gas: U256::from(data.base_fee_per_gas),
                block_hash: data.block_hash.unwrap_or_default(),
                transactions: vec![tx_list.clone()],
            },
            signature,
            is_forced_inclusion: request.is_forced_inclusion,
            end_of_sequencing: request.end_of_sequencing,
        })
    }

    fn validate_anchor(
        &self,
        tx: &TxEnvelope,
        request: &BuildPreconfBlockRequest,
    ) -> Result<(), PreconfError> {
        if !tx.is_eip1559() {
            return Err(PreconfError::InvalidAnchor("not a dynamic fee transaction"));
        }
        if tx.to() != Some(self.anchor) {
            return Err(PreconfError::InvalidAnchor("not sent to the anchor contract"));
        }
        if tx.gas_limit() != ANCHOR_V3_GAS_LIMIT {
            return Err(PreconfError::InvalidAnchor("unexpected gas limit"));
        }
        let Some(call @ AnchorCall::V3(_)) = AnchorCall::try_decode(tx.input()) else {
            return Err(PreconfError::InvalidAnchor("not an anchorV3 call"));
        };
        if call.anchor_block_id() != request.anchor_block_id ||
            call.anchor_state_root() != request.anchor_state_root
        {
            return Err(PreconfError::InvalidAnchor("anchored block mismatch"));
        }
        Ok(())
    }
}

fn parse_signature(bytes: &[u8]) -> Result<FixedBytes<65>, PreconfError> {
    let raw: [u8; 65] = bytes.try_into().map_err(|_| PreconfError::BadSignature)?;
    Signature::from_raw_array(&raw).map_err(|_| PreconfError::BadSignature)?;
    Ok(FixedBytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::{SignableTransaction, TxEip1559};
    use alloy_primitives::{address, b256, TxKind};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use taiko_codec::encode_tx_list;
    use taiko_l1::anchor_v3_input;
    use taiko_primitives::GOLDEN_TOUCH_PRIVATE_KEY;

    const ANCHOR: Address = address!("0x1670000000000000000000000000000000010001");
    const STATE_ROOT: B256 =
        b256!("0x5f2a5aa7e6cbe0e38b8e6bcf2d8b3a2b1f1e1d1c1b1a19181716151413121110");

    fn anchor_tx(anchor_block_id: u64, gas_limit: u64) -> TxEnvelope {
        let signer = PrivateKeySigner::from_bytes(&GOLDEN_TOUCH_PRIVATE_KEY).unwrap();
        let tx = TxEip1559 {
            chain_id: 167000,
            nonce: 7,
            gas_limit,
            max_fee_per_gas: 10_000_000,
            max_priority_fee_per_gas: 0,
            to: TxKind::Call(ANCHOR),
            value: U256::ZERO,
            access_list: Default::default(),
            input: anchor_v3_input(anchor_block_id, STATE_ROOT, 0, Default::default(), vec![]),
        };
        let signature = signer.sign_hash_sync(&tx.signature_hash()).unwrap();
        tx.into_signed(signature).into()
    }

    fn request(txs: &[TxEnvelope]) -> BuildPreconfBlockRequest {
        BuildPreconfBlockRequest {
            executable_data: Some(ExecutableData {
                parent_hash: B256::repeat_byte(1),
                fee_recipient: Address::repeat_byte(2),
                number: 1_000,
                gas_limit: 241_000_000,
                timestamp: 1_700_000_000,
                transactions: vec![encode_tx_list(txs).into()],
                extra_data: Bytes::from_static(&[0x32]),
                base_fee_per_gas: 10_000_000,
                block_hash: None,
            }),
            anchor_block_id: 88,
            anchor_state_root: STATE_ROOT,
            ..Default::default()
        }
    }

    fn validator() -> PreconfValidator {
        PreconfValidator { pacaya_fork_height: 10, anchor: ANCHOR, max_tx_list_bytes: 126_976 }
    }

    #[test]
    fn test_should_validate_request() -> eyre::Result<()> {
        // Given
        let mut request = request(&[anchor_tx(88, ANCHOR_V3_GAS_LIMIT)]);
        request.end_of_sequencing = true;

        // When
        let envelope = validator().validate(&request)?;

        // Then
        assert_eq!(envelope.number(), 1_000);
        assert_eq!(envelope.parent_hash(), B256::repeat_byte(1));
        assert_eq!(envelope.payload.prev_randao, pacaya_difficulty(1_000));
        assert_eq!(envelope.payload.base_fee_per_gas, U256::from(10_000_000));
        assert_eq!(envelope.payload.transactions.len(), 1);
        assert!(envelope.end_of_sequencing);
        assert!(envelope.signature.is_none());

        Ok(())
    }

    #[test]
    fn test_should_decode_request_body() -> eyre::Result<()> {
        let body = r#"{
            "executableData": {
                "parentHash": "0x0101010101010101010101010101010101010101010101010101010101010101",
                "feeRecipient": "0x0202020202020202020202020202020202020202",
                "blockNumber": 1000,
                "gasLimit": 241000000,
                "timestamp": 1700000000,
                "transactions": ["0x78"],
                "extraData": "0x32",
                "baseFeePerGas": 10000000
            },
            "anchorBlockID": 88,
            "isForcedInclusion": true
        }"#;

        let request = BuildPreconfBlockRequest::from_json(body.as_bytes())?;

        let data = request.executable_data.expect("executable data");
        assert_eq!(data.number, 1000);
        assert_eq!(data.transactions, vec![Bytes::from_static(&[0x78])]);
        assert_eq!(request.anchor_block_id, 88);
        assert!(request.is_forced_inclusion);
        assert!(!request.end_of_sequencing);

        Ok(())
    }

    #[test]
    fn test_should_reject_undecodable_body() {
        let err = BuildPreconfBlockRequest::from_json(b"{\"executableData\": 1}").unwrap_err();

        assert!(matches!(err, PreconfError::InvalidBody(_)));
        assert_eq!(err.status_code(), 422);
    }

    #[test]
    fn test_should_reject_missing_fields() {
        let valid = request(&[anchor_tx(88, ANCHOR_V3_GAS_LIMIT)]);
        let cases: [(&str, fn(&mut BuildPreconfBlockRequest)); 6] = [
            ("timestamp", |r| r.executable_data.as_mut().unwrap().timestamp = 0),
            ("feeRecipient", |r| r.executable_data.as_mut().unwrap().fee_recipient = Address::ZERO),
            ("gasLimit", |r| r.executable_data.as_mut().unwrap().gas_limit = 0),
            ("baseFeePerGas", |r| r.executable_data.as_mut().unwrap().base_fee_per_gas = 0),
            ("extraData", |r| r.executable_data.as_mut().unwrap().extra_data = Bytes::new()),
            ("anchorBlockID", |r| r.anchor_block_id = 0),
        ];

        for (field, mutate) in cases {
            let mut request = valid.clone();
            mutate(&mut request);

            let err = validator().validate(&request).unwrap_err();
            assert!(matches!(err, PreconfError::MissingField(f) if f == field), "{field}: {err}");
            assert_eq!(err.status_code(), 400);
        }

        let mut request = valid;
        request.executable_data = None;
        assert!(matches!(
            validator().validate(&request),
            Err(PreconfError::MissingExecutableData)
        ));
    }

    #[test]
    fn test_should_require_single_tx_list() {
        let mut request = request(&[anchor_tx(88, ANCHOR_V3_GAS_LIMIT)]);
        let data = request.executable_data.as_mut().unwrap();
        data.transactions.push(data.transactions[0].clone());

        assert!(matches!(validator().validate(&request), Err(PreconfError::TransactionCount(2))));
    }

    #[test]
    fn test_should_reject_invalid_tx_lists() {
        // empty list
        let err = validator().validate(&request(&[])).unwrap_err();
        assert!(matches!(err, PreconfError::MissingAnchor));

        // not zlib
        let mut invalid = request(&[]);
        invalid.executable_data.as_mut().unwrap().transactions = vec![Bytes::from_static(&[1, 2])];
        assert!(matches!(validator().validate(&invalid), Err(PreconfError::InvalidTxList(_))));

        // too large
        let mut validator = validator();
        validator.max_tx_list_bytes = 1;
        assert!(matches!(
            validator.validate(&request(&[anchor_tx(88, ANCHOR_V3_GAS_LIMIT)])),
            Err(PreconfError::TxListTooLarge { max: 1, .. })
        ));
    }

    #[test]
    fn test_should_reject_invalid_anchor() {
        let wrong_block = request(&[anchor_tx(87, ANCHOR_V3_GAS_LIMIT)]);
        let wrong_gas = request(&[anchor_tx(88, 250_000)]);

        assert!(matches!(validator().validate(&wrong_block), Err(PreconfError::InvalidAnchor(_))));
        assert!(matches!(validator().validate(&wrong_gas), Err(PreconfError::InvalidAnchor(_))));
    }

    #[test]
    fn test_should_reject_pre_fork_block() {
        let mut validator = validator();
        validator.pacaya_fork_height = 1_001;

        assert!(matches!(
            validator.validate(&request(&[anchor_tx(88, ANCHOR_V3_GAS_LIMIT)])),
            Err(PreconfError::PreForkBlock { number: 1_000, fork_height: 1_001 })
        ));
    }

    #[test]
    fn test_should_check_signature() -> eyre::Result<()> {
        let mut request = request(&[anchor_tx(88, ANCHOR_V3_GAS_LIMIT)]);

        request.signature = Some(Bytes::from(vec![1u8; 64]));
        assert!(matches!(validator().validate(&request), Err(PreconfError::BadSignature)));

        let signer = PrivateKeySigner::random();
        let signature = signer.sign_hash_sync(&B256::repeat_byte(3))?.as_bytes();
        request.signature = Some(Bytes::copy_from_slice(&signature));
        let envelope = validator().validate(&request)?;
        assert_eq!(envelope.signature, Some(FixedBytes(signature)));

        Ok(())
    }
}
