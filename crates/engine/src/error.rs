use alloy_rpc_types_engine::PayloadStatusEnum;
use alloy_transport::{RpcError, TransportErrorKind};

/// The error type for the engine API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine RPC failed.
    #[error("engine RPC error: {0}")]
    Rpc(#[from] RpcError<TransportErrorKind>),
    /// The fork choice update was answered with an unexpected status.
    #[error("unexpected forkchoice update status: {0:?}")]
    ForkchoiceUpdateStatus(PayloadStatusEnum),
    /// The fork choice update started no payload build.
    #[error("forkchoice update returned no payload id")]
    MissingPayloadId,
    /// The new payload was answered with an unexpected status.
    #[error("unexpected new payload status: {0:?}")]
    NewPayloadStatus(PayloadStatusEnum),
}
