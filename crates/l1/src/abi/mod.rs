#![allow(missing_docs)]

use alloy_sol_types::sol;

pub(crate) mod calls;
pub(crate) mod logs;

sol! {
    #[derive(Debug, Default, PartialEq, Eq)]
    #[cfg_attr(any(test, feature = "test-utils"), derive(arbitrary::Arbitrary))]
    struct BaseFeeConfig {
        uint8 adjustmentQuotient;
        uint8 sharingPctg;
        uint32 gasIssuancePerSecond;
        uint64 minGasExcess;
        uint32 maxGasIssuancePerBlock;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    #[cfg_attr(any(test, feature = "test-utils"), derive(arbitrary::Arbitrary))]
    struct BlockMetadataV2 {
        bytes32 anchorBlockHash;
        bytes32 difficulty;
        bytes32 blobHash;
        bytes32 extraData;
        address coinbase;
        uint64 id;
        uint32 gasLimit;
        uint64 timestamp;
        uint64 anchorBlockId;
        uint16 minTier;
        bool blobUsed;
        bytes32 parentMetaHash;
        address proposer;
        uint96 livenessBond;
        uint64 proposedAt;
        uint64 proposedIn;
        uint32 blobTxListOffset;
        uint32 blobTxListLength;
        uint8 blobIndex;
        BaseFeeConfig baseFeeConfig;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    #[cfg_attr(any(test, feature = "test-utils"), derive(arbitrary::Arbitrary))]
    struct BlockParams {
        uint16 numTransactions;
        uint8 timeShift;
        bytes32[] signalSlots;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    #[cfg_attr(any(test, feature = "test-utils"), derive(arbitrary::Arbitrary))]
    struct BatchInfo {
        bytes32 txsHash;
        BlockParams[] blocks;
        bytes32[] blobHashes;
        bytes32 extraData;
        address coinbase;
        uint64 proposedIn;
        uint64 blobCreatedIn;
        uint32 blobByteOffset;
        uint32 blobByteSize;
        uint32 gasLimit;
        uint64 lastBlockId;
        uint64 lastBlockTimestamp;
        uint64 anchorBlockId;
        bytes32 anchorBlockHash;
        BaseFeeConfig baseFeeConfig;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    #[cfg_attr(any(test, feature = "test-utils"), derive(arbitrary::Arbitrary))]
    struct BatchMetadata {
        bytes32 infoHash;
        address proposer;
        uint64 batchId;
        uint64 proposedAt;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Batch {
        bytes32 metaHash;
        uint64 lastBlockId;
        uint96 reserved3;
        uint96 livenessBond;
        uint64 batchId;
        uint64 lastBlockTimestamp;
        uint64 anchorBlockId;
        uint24 nextTransitionId;
        uint8 reserved4;
        uint24 verifiedTransitionId;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct Transition {
        bytes32 parentHash;
        bytes32 blockHash;
        bytes32 stateRoot;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct TransitionState {
        bytes32 parentHash;
        bytes32 blockHash;
        bytes32 stateRoot;
        address prover;
        bool inProvingWindow;
        uint48 createdAt;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct BlockV2 {
        bytes32 metaHash;
        address assignedProver;
        uint96 livenessBond;
        uint64 blockId;
        uint64 proposedAt;
        uint64 proposedIn;
        uint24 nextTransitionId;
        bool livenessBondReturned;
        uint24 verifiedTransitionId;
    }

    #[derive(Debug, Default, PartialEq, Eq)]
    struct TransitionStateOntake {
        bytes32 key;
        bytes32 blockHash;
        bytes32 stateRoot;
        address prover;
        uint96 validityBond;
        address contester;
        uint96 contestBond;
        uint64 timestamp;
        uint16 tier;
        uint8 reserved1;
    }

    /// The Taiko inbox on L1, for both the Ontake and Pacaya forks.
    #[allow(missing_docs)]
    interface ITaikoInbox {
        #[derive(Debug)]
        event BlockProposedV2(uint256 indexed blockId, BlockMetadataV2 meta);
        #[derive(Debug)]
        event CalldataTxList(uint256 indexed blockId, bytes txList);
        #[derive(Debug)]
        event TransitionProvedV2(uint256 indexed blockId, Transition tran, address prover, uint96 validityBond, uint16 tier, uint64 proposedIn);
        #[derive(Debug)]
        event BatchProposed(BatchInfo info, BatchMetadata meta, bytes txList);
        #[derive(Debug)]
        event BatchesProved(address verifier, uint64[] batchIds, Transition[] transitions);
        #[derive(Debug)]
        event BatchesVerified(uint64 batchId, bytes32 blockHash);

        function getBatch(uint64 batchId) external view returns (Batch memory batch);
        function getBatchVerifyingTransition(uint64 batchId) external view returns (TransitionState memory ts);
        function getLastVerifiedTransition() external view returns (uint64 batchId, uint64 blockId, TransitionState memory ts);
        function getBlockV2(uint64 blockId) external view returns (BlockV2 memory blk);
        function getTransition(uint64 blockId, uint32 tid) external view returns (TransitionStateOntake memory ts);
        function getLastVerifiedBlock() external view returns (uint64 blockId, bytes32 blockHash, bytes32 stateRoot, uint64 verifiedAt);
    }

    /// The Taiko anchor contract on L2.
    #[allow(missing_docs)]
    interface ITaikoAnchor {
        #[derive(Debug, PartialEq, Eq)]
        function anchor(bytes32 l1BlockHash, bytes32 l1StateRoot, uint64 l1BlockId, uint32 parentGasUsed) external;
        #[derive(Debug, PartialEq, Eq)]
        function anchorV2(uint64 anchorBlockId, bytes32 anchorStateRoot, uint32 parentGasUsed, BaseFeeConfig baseFeeConfig) external;
        #[derive(Debug, PartialEq, Eq)]
        function anchorV3(uint64 anchorBlockId, bytes32 anchorStateRoot, uint32 parentGasUsed, BaseFeeConfig baseFeeConfig, bytes32[] signalSlots) external;
        function getBasefeeV2(uint32 parentGasUsed, uint64 blockTimestamp, BaseFeeConfig baseFeeConfig) external view returns (uint256 basefee, uint64 newGasTarget, uint64 newGasExcess);
    }
}

impl From<taiko_primitives::BaseFeeConfig> for BaseFeeConfig {
    fn from(config: taiko_primitives::BaseFeeConfig) -> Self {
        Self {
            adjustmentQuotient: config.adjustment_quotient,
            sharingPctg: config.sharing_pctg,
            gasIssuancePerSecond: config.gas_issuance_per_second,
            minGasExcess: config.min_gas_excess,
            maxGasIssuancePerBlock: config.max_gas_issuance_per_block,
        }
    }
}

impl From<BaseFeeConfig> for taiko_primitives::BaseFeeConfig {
    fn from(config: BaseFeeConfig) -> Self {
        Self {
            adjustment_quotient: config.adjustmentQuotient,
            sharing_pctg: config.sharingPctg,
            gas_issuance_per_second: config.gasIssuancePerSecond,
            min_gas_excess: config.minGasExcess,
            max_gas_issuance_per_block: config.maxGasIssuancePerBlock,
        }
    }
}
