use super::{EngineError, TaikoEngineApi};
use crate::{TaikoExecutionPayload, TaikoPayloadAttributes};
use alloy_rpc_types_engine::{
    ForkchoiceState as AlloyForkchoiceState, ForkchoiceUpdated, PayloadId, PayloadStatusEnum,
};
use tracing::{debug, error, trace};

/// Calls `engine_newPayloadV2` and logs the result.
pub(crate) async fn new_payload<EC: TaikoEngineApi>(
    client: &EC,
    payload: TaikoExecutionPayload,
) -> Result<PayloadStatusEnum, EngineError> {
    let block_number = payload.block_number();
    let response = client.new_payload_v2(payload).await?;

    match &response.status {
        PayloadStatusEnum::Invalid { validation_error } => {
            error!(target: "taiko::engine", block_number, ?validation_error, "execution payload is invalid");
        }
        PayloadStatusEnum::Syncing => {
            debug!(target: "taiko::engine", block_number, "execution client is syncing");
        }
        PayloadStatusEnum::Accepted => {
            error!(target: "taiko::engine", block_number, "execution payload part of side chain");
        }
        PayloadStatusEnum::Valid => {
            trace!(target: "taiko::engine", block_number, "execution payload valid");
        }
    };

    Ok(response.status)
}

/// Calls `engine_forkchoiceUpdatedV2` and logs the result.
pub(crate) async fn forkchoice_updated<EC: TaikoEngineApi>(
    client: &EC,
    fcs: AlloyForkchoiceState,
    attributes: Option<TaikoPayloadAttributes>,
) -> Result<ForkchoiceUpdated, EngineError> {
    let forkchoice_updated = client.forkchoice_updated_v2(fcs, attributes).await?;

    match &forkchoice_updated.payload_status.status {
        PayloadStatusEnum::Invalid { validation_error } => {
            error!(target: "taiko::engine", head = ?fcs.head_block_hash, ?validation_error, "failed to issue forkchoice");
        }
        PayloadStatusEnum::Syncing => {
            debug!(target: "taiko::engine", head = ?fcs.head_block_hash, "head has been seen before, but not part of the chain");
        }
        PayloadStatusEnum::Accepted => {
            error!(target: "taiko::engine", head = ?fcs.head_block_hash, "forkchoice update returned an accepted status");
        }
        PayloadStatusEnum::Valid => {
            trace!(target: "taiko::engine", head = ?fcs.head_block_hash, "forkchoice updated");
        }
    };

    Ok(forkchoice_updated)
}

/// Calls `engine_getPayloadV2`.
pub(crate) async fn get_payload<EC: TaikoEngineApi>(
    client: &EC,
    id: PayloadId,
) -> Result<TaikoExecutionPayload, EngineError> {
    Ok(client.get_payload_v2(id).await?.execution_payload)
}
