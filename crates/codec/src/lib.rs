//! Codecs for the transaction lists proposed to the Taiko inbox.

pub use blob::{decode_blob_data, encode_blob_data, BLOB_MAX_DATA_SIZE};
mod blob;

pub use error::CodecError;
mod error;

pub use txlist::{compress, decode_tx_list, decompress, encode_tx_list, TxListDecompressor};
mod txlist;

/// Returns the `size` bytes of `data` starting at `offset`.
pub fn slice_tx_list(data: &[u8], offset: u32, size: u32) -> Result<&[u8], CodecError> {
    let start = offset as usize;
    let end = start + size as usize;
    data.get(start..end).ok_or(CodecError::OutOfBounds { offset, size, len: data.len() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_slice_tx_list() {
        let data = [1u8, 2, 3, 4, 5];

        assert_eq!(slice_tx_list(&data, 1, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(slice_tx_list(&data, 5, 0).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn test_should_reject_out_of_bounds_slice() {
        let data = [1u8, 2, 3, 4, 5];

        assert!(matches!(
            slice_tx_list(&data, 3, 3),
            Err(CodecError::OutOfBounds { offset: 3, size: 3, len: 5 })
        ));
    }
}
