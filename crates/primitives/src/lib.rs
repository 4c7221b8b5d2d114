//! Primitive types shared by the Taiko driver crates.

pub use block::{BlockInfo, L2BlockInfo};
mod block;

pub use bounded_vec::BoundedVec;
mod bounded_vec;

pub use constants::{
    anchor_address, pacaya_difficulty, ANCHOR_GAS_LIMIT, ANCHOR_V3_GAS_LIMIT,
    BLOCK_MAX_TX_LIST_BYTES, GOLDEN_TOUCH_ADDRESS, GOLDEN_TOUCH_PRIVATE_KEY, RESYNC_GAP,
};
mod constants;

pub use fork::ForkHeights;
mod fork;

pub use l1_origin::L1Origin;
mod l1_origin;

pub use metadata::{
    BaseFeeConfig, BlockParams, OntakeMetadata, PacayaMetadata, ProposalMetadata,
};
mod metadata;

pub use sync::{ReorgCheckResult, SyncProgress, VerifiedBlock};
mod sync;
