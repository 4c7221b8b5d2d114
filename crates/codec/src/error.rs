/// An error occurring while handling transaction list data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The transaction list slice lies outside of the data.
    #[error("tx list slice out of bounds: offset {offset}, size {size}, data length {len}")]
    OutOfBounds {
        /// The slice offset.
        offset: u32,
        /// The slice size.
        size: u32,
        /// The length of the data.
        len: usize,
    },
    /// The blob data is not encoded with the expected version.
    #[error("unsupported blob encoding version {0}")]
    BlobVersion(u8),
    /// The blob data is malformed.
    #[error("invalid blob data: {0}")]
    InvalidBlob(&'static str),
    /// The data is too large to fit in a blob.
    #[error("data of {0} bytes does not fit in a blob")]
    BlobTooLarge(usize),
    /// The calldata transaction list exceeds the maximum size.
    #[error("tx list of {0} bytes exceeds the maximum size")]
    TxListTooLarge(usize),
    /// The zlib stream is invalid.
    #[error("zlib decompression failed")]
    Zlib,
    /// The RLP transaction list is invalid.
    #[error(transparent)]
    Rlp(#[from] alloy_rlp::Error),
}
