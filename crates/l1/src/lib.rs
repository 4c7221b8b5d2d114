//! ABI bindings of the Taiko inbox and anchor contracts.

pub use abi::{
    calls::{anchor_v1_input, anchor_v2_input, anchor_v3_input, AnchorCall},
    logs::{decode_calldata_tx_list, decode_proposal, proposal_event_signatures, try_decode_log},
    BaseFeeConfig, Batch, BatchInfo, BatchMetadata, BlockMetadataV2, BlockParams, BlockV2,
    ITaikoAnchor, ITaikoInbox, Transition, TransitionState, TransitionStateOntake,
};
mod abi;
