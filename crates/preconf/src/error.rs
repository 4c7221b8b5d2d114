use alloy_primitives::B256;
use taiko_codec::CodecError;

/// An error rejecting a preconfirmation request.
#[derive(Debug, thiserror::Error)]
pub enum PreconfError {
    /// The execution engine is syncing and can't build blocks.
    #[error("L2 execution engine is syncing")]
    EngineSyncing,
    /// The request body could not be decoded.
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),
    /// The request carries no executable data.
    #[error("executable data is required")]
    MissingExecutableData,
    /// A required field is zero or empty.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// The block precedes the Pacaya fork.
    #[error("block number {number} is before the Pacaya fork height {fork_height}")]
    PreForkBlock {
        /// The block number.
        number: u64,
        /// The Pacaya fork height.
        fork_height: u64,
    },
    /// The payload carries other than a single transaction list entry.
    #[error("expected exactly one transaction list, got {0}")]
    TransactionCount(usize),
    /// The compressed transaction list exceeds the maximum size.
    #[error("compressed transactions size exceeds max allowed size: {size} > {max}")]
    TxListTooLarge {
        /// The size of the compressed list.
        size: usize,
        /// The maximum size allowed.
        max: usize,
    },
    /// The transaction list could not be decoded.
    #[error("invalid transaction list: {0}")]
    InvalidTxList(#[from] CodecError),
    /// The transaction list holds no anchor transaction.
    #[error("empty transaction list, missing anchor transaction")]
    MissingAnchor,
    /// The first transaction is not a valid anchor transaction.
    #[error("invalid anchor transaction: {0}")]
    InvalidAnchor(&'static str),
    /// The signature is malformed.
    #[error("invalid signature")]
    BadSignature,
    /// The parent block could not be fetched.
    #[error("failed to fetch parent header {hash}: {message}")]
    ParentLookup {
        /// The parent hash.
        hash: B256,
        /// The lookup error.
        message: String,
    },
    /// The block could not be inserted.
    #[error("failed to insert preconfirmation block: {0}")]
    Insert(String),
}

impl PreconfError {
    /// Returns the HTTP status code the error is answered with.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidBody(_) => 422,
            Self::ParentLookup { .. } | Self::Insert(_) => 500,
            _ => 400,
        }
    }

    /// Returns the body the error is answered with.
    pub fn response(&self) -> ErrorResponse {
        ErrorResponse { error: self.to_string() }
    }
}

/// The JSON body of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// The error message.
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_map_status_codes() {
        let body = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();

        assert_eq!(PreconfError::EngineSyncing.status_code(), 400);
        assert_eq!(PreconfError::MissingExecutableData.status_code(), 400);
        assert_eq!(PreconfError::TransactionCount(2).status_code(), 400);
        assert_eq!(PreconfError::BadSignature.status_code(), 400);
        assert_eq!(PreconfError::InvalidBody(body).status_code(), 422);
        assert_eq!(PreconfError::Insert("engine down".into()).status_code(), 500);
        assert_eq!(
            PreconfError::ParentLookup { hash: B256::ZERO, message: "timeout".into() }
                .status_code(),
            500
        );
    }

    #[test]
    fn test_should_serialize_error_body() -> eyre::Result<()> {
        let body = serde_json::to_string(&PreconfError::MissingField("feeRecipient").response())?;

        assert_eq!(body, r#"{"error":"feeRecipient is required"}"#);

        Ok(())
    }
}
