use crate::CodecError;
use alloy_chains::NamedChain;
use alloy_consensus::TxEnvelope;
use miniz_oxide::{deflate::compress_to_vec_zlib, inflate::decompress_to_vec_zlib};

/// The zlib compression level used for proposed transaction lists.
const ZLIB_COMPRESSION_LEVEL: u8 = 6;

/// Zlib-decompresses the data.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    decompress_to_vec_zlib(data).map_err(|_| CodecError::Zlib)
}

/// Zlib-compresses the data.
pub fn compress(data: &[u8]) -> Vec<u8> {
    compress_to_vec_zlib(data, ZLIB_COMPRESSION_LEVEL)
}

/// RLP encodes then compresses the transactions into a transaction list as proposed on L1.
pub fn encode_tx_list(txs: &[TxEnvelope]) -> Vec<u8> {
    let mut out = Vec::new();
    alloy_rlp::encode_list::<_, TxEnvelope>(txs, &mut out);
    compress(&out)
}

/// Decompresses then RLP decodes the transaction list, failing on invalid bytes.
pub fn decode_tx_list(bytes: &[u8]) -> Result<Vec<TxEnvelope>, CodecError> {
    decode_txs(&decompress(bytes)?)
}

/// Decodes proposed transaction lists.
///
/// An invalid transaction list is never an error: the protocol treats it as an empty list so that
/// the block is still produced with only its anchor transaction.
#[derive(Debug, Clone, Copy)]
pub struct TxListDecompressor {
    chain_id: u64,
    max_bytes_per_tx_list: usize,
}

impl TxListDecompressor {
    /// Returns a new decompressor for the chain.
    pub const fn new(chain_id: u64, max_bytes_per_tx_list: usize) -> Self {
        Self { chain_id, max_bytes_per_tx_list }
    }

    /// Decodes the transaction list, returning an empty list if it is invalid.
    ///
    /// Calldata lists are capped at the maximum size. Before Pacaya, Hekla applies the cap to the
    /// decompressed bytes, every other case applies it to the compressed bytes.
    pub fn try_decompress(&self, bytes: &[u8], blob_used: bool, post_pacaya: bool) -> Vec<TxEnvelope> {
        if bytes.is_empty() {
            return Vec::new();
        }

        let hekla = self.chain_id == NamedChain::TaikoHekla as u64 && !post_pacaya;
        let result = if hekla {
            decompress(bytes).and_then(|raw| {
                self.check_size(raw.len(), blob_used)?;
                decode_txs(&raw)
            })
        } else {
            self.check_size(bytes.len(), blob_used).and_then(|_| decode_txs(&decompress(bytes)?))
        };

        result.unwrap_or_else(|err| {
            tracing::info!(target: "taiko::codec", ?err, len = bytes.len(), blob_used, "invalid tx list, using empty list");
            Vec::new()
        })
    }

    const fn check_size(&self, len: usize, blob_used: bool) -> Result<(), CodecError> {
        if !blob_used && len > self.max_bytes_per_tx_list {
            return Err(CodecError::TxListTooLarge(len));
        }
        Ok(())
    }
}

fn decode_txs(raw: &[u8]) -> Result<Vec<TxEnvelope>, CodecError> {
    Ok(alloy_rlp::decode_exact(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::{SignableTransaction, TxEip1559};
    use alloy_primitives::{address, Bytes, TxKind, U256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    const TAIKO_MAINNET: u64 = 167000;
    const HEKLA: u64 = 167009;
    const MAX_BYTES: usize = 1_000;

    fn signed_tx(nonce: u64, input: Bytes) -> TxEnvelope {
        let signer = PrivateKeySigner::random();
        let tx = TxEip1559 {
            chain_id: TAIKO_MAINNET,
            nonce,
            gas_limit: 21_000,
            max_fee_per_gas: 1_000_000_000,
            max_priority_fee_per_gas: 1,
            to: TxKind::Call(address!("0x1670000000000000000000000000000000010001")),
            value: U256::from(1),
            access_list: Default::default(),
            input,
        };
        let signature = signer.sign_hash_sync(&tx.signature_hash()).unwrap();
        tx.into_signed(signature).into()
    }

    #[test]
    fn test_should_decompress_tx_list() {
        // Given
        let txs = vec![signed_tx(0, Bytes::new()), signed_tx(1, Bytes::new())];
        let bytes = encode_tx_list(&txs);

        // When
        let decoded = TxListDecompressor::new(TAIKO_MAINNET, MAX_BYTES).try_decompress(&bytes, false, true);

        // Then
        assert_eq!(decoded, txs);
    }

    #[test]
    fn test_should_return_empty_list_for_invalid_input() {
        let decompressor = TxListDecompressor::new(TAIKO_MAINNET, MAX_BYTES);

        assert!(decompressor.try_decompress(&[], false, true).is_empty());
        assert!(decompressor.try_decompress(&[1, 2, 3], false, true).is_empty());
        // valid zlib stream, invalid rlp.
        assert!(decompressor.try_decompress(&compress(&[0xff, 0x01]), false, true).is_empty());
    }

    #[test]
    fn test_should_cap_calldata_tx_list_size() {
        // Given
        let txs = vec![signed_tx(0, Bytes::from(vec![0xab; 4 * MAX_BYTES]))];
        let bytes = encode_tx_list(&txs);
        assert!(bytes.len() < MAX_BYTES);
        let decompressor = TxListDecompressor::new(HEKLA, MAX_BYTES);

        // When, Then
        // hekla before pacaya caps the decompressed bytes.
        assert!(decompressor.try_decompress(&bytes, false, false).is_empty());
        assert_eq!(decompressor.try_decompress(&bytes, true, false), txs);
        // any other case caps the compressed bytes.
        assert_eq!(decompressor.try_decompress(&bytes, false, true), txs);
        assert_eq!(TxListDecompressor::new(TAIKO_MAINNET, MAX_BYTES).try_decompress(&bytes, false, false), txs);
    }

    #[test]
    fn test_should_not_cap_blob_tx_list_size() {
        let txs: Vec<_> = (0..40).map(|i| signed_tx(i, Bytes::from(vec![i as u8; 64]))).collect();
        let bytes = encode_tx_list(&txs);
        assert!(bytes.len() > MAX_BYTES);

        let decompressor = TxListDecompressor::new(TAIKO_MAINNET, MAX_BYTES);

        assert!(decompressor.try_decompress(&bytes, false, true).is_empty());
        assert_eq!(decompressor.try_decompress(&bytes, true, true), txs);
    }
}
