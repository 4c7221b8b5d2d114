use crate::DriverError;
use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_rpc_types_eth::Header;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use taiko_l1::{anchor_v2_input, anchor_v3_input};
use taiko_primitives::{BaseFeeConfig, ANCHOR_GAS_LIMIT, ANCHOR_V3_GAS_LIMIT};
use taiko_providers::L2ChainProvider;

/// Assembles the anchor transactions opening every L2 block, signed by the golden touch account.
///
/// Signatures are deterministic, so assembling the anchor of a block twice yields the same
/// transaction hash.
#[derive(Debug, Clone)]
pub struct AnchorTxConstructor<L2> {
    /// The L2 execution engine client.
    l2: L2,
    /// The golden touch signer.
    signer: PrivateKeySigner,
    /// The address of the anchor contract.
    anchor: Address,
    /// The L2 chain id.
    chain_id: u64,
}

impl<L2: L2ChainProvider> AnchorTxConstructor<L2> {
    /// Returns a new [`AnchorTxConstructor`] signing with the provided golden touch key.
    pub fn new(
        l2: L2,
        anchor: Address,
        chain_id: u64,
        golden_touch_key: B256,
    ) -> Result<Self, DriverError> {
        let signer = PrivateKeySigner::from_bytes(&golden_touch_key)
            .map_err(|_| DriverError::InvalidGoldenTouchKey)?;
        Ok(Self { l2, signer, anchor, chain_id })
    }

    /// Returns the address of the golden touch account.
    pub fn golden_touch(&self) -> Address {
        self.signer.address()
    }

    /// Assembles an Ontake `anchorV2` transaction for the child of `parent`.
    pub async fn assemble_anchor_v2_tx(
        &self,
        parent: &Header,
        anchor_block_id: u64,
        anchor_state_root: B256,
        base_fee_config: BaseFeeConfig,
        base_fee: U256,
    ) -> Result<TxEnvelope, DriverError> {
        let input = anchor_v2_input(
            anchor_block_id,
            anchor_state_root,
            parent.gas_used as u32,
            base_fee_config.into(),
        );
        self.sign(parent, ANCHOR_GAS_LIMIT, input, base_fee).await
    }

    /// Assembles a Pacaya `anchorV3` transaction for the child of `parent`.
    pub async fn assemble_anchor_v3_tx(
        &self,
        parent: &Header,
        anchor_block_id: u64,
        anchor_state_root: B256,
        base_fee_config: BaseFeeConfig,
        signal_slots: Vec<B256>,
        base_fee: U256,
    ) -> Result<TxEnvelope, DriverError> {
        let input = anchor_v3_input(
            anchor_block_id,
            anchor_state_root,
            parent.gas_used as u32,
            base_fee_config.into(),
            signal_slots,
        );
        self.sign(parent, ANCHOR_V3_GAS_LIMIT, input, base_fee).await
    }

    async fn sign(
        &self,
        parent: &Header,
        gas_limit: u64,
        input: Bytes,
        base_fee: U256,
    ) -> Result<TxEnvelope, DriverError> {
        let nonce = self.l2.nonce_at(self.signer.address(), parent.number).await?;
        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce,
            gas_limit,
            max_fee_per_gas: base_fee.saturating_to(),
            max_priority_fee_per_gas: 0,
            to: TxKind::Call(self.anchor),
            value: U256::ZERO,
            access_list: Default::default(),
            input,
        };
        let signature = self.signer.sign_hash_sync(&tx.signature_hash())?;
        Ok(tx.into_signed(signature).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_consensus::Transaction;
    use taiko_engine::test_utils::MockL2Node;
    use taiko_l1::AnchorCall;
    use taiko_primitives::{GOLDEN_TOUCH_ADDRESS, GOLDEN_TOUCH_PRIVATE_KEY};

    fn constructor() -> eyre::Result<AnchorTxConstructor<MockL2Node>> {
        Ok(AnchorTxConstructor::new(
            MockL2Node::new(),
            Address::repeat_byte(0x10),
            167_001,
            GOLDEN_TOUCH_PRIVATE_KEY,
        )?)
    }

    #[test]
    fn test_should_sign_with_golden_touch() -> eyre::Result<()> {
        assert_eq!(constructor()?.golden_touch(), GOLDEN_TOUCH_ADDRESS);
        Ok(())
    }

    #[tokio::test]
    async fn test_should_assemble_deterministic_anchor_v3() -> eyre::Result<()> {
        // Given
        let constructor = constructor()?;
        let parent = constructor.l2.l2_head().await?;
        let root = B256::repeat_byte(0xab);

        // When
        let first = constructor
            .assemble_anchor_v3_tx(&parent, 7, root, Default::default(), vec![], U256::from(10))
            .await?;
        let second = constructor
            .assemble_anchor_v3_tx(&parent, 7, root, Default::default(), vec![], U256::from(10))
            .await?;

        // Then
        assert_eq!(first.tx_hash(), second.tx_hash());
        assert_eq!(first.gas_limit(), ANCHOR_V3_GAS_LIMIT);
        assert_eq!(first.max_fee_per_gas(), 10);
        assert_eq!(first.max_priority_fee_per_gas(), Some(0));
        assert_eq!(first.to(), Some(Address::repeat_byte(0x10)));
        let call =
            AnchorCall::try_decode(first.input()).ok_or_else(|| eyre::eyre!("not an anchor"))?;
        assert!(matches!(call, AnchorCall::V3(_)));
        assert_eq!(call.anchor_block_id(), 7);
        assert_eq!(call.anchor_state_root(), root);
        assert_eq!(call.parent_gas_used(), parent.gas_used as u32);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_assemble_anchor_v2() -> eyre::Result<()> {
        let constructor = constructor()?;
        let parent = constructor.l2.l2_head().await?;

        let tx = constructor
            .assemble_anchor_v2_tx(&parent, 3, B256::ZERO, Default::default(), U256::from(1))
            .await?;

        assert_eq!(tx.gas_limit(), ANCHOR_GAS_LIMIT);
        assert_eq!(tx.nonce(), parent.number);
        assert!(matches!(AnchorCall::try_decode(tx.input()), Some(AnchorCall::V2(_))));

        Ok(())
    }

    #[test]
    fn test_should_reject_invalid_key() {
        let result = AnchorTxConstructor::new(MockL2Node::new(), Address::ZERO, 1, B256::ZERO);
        assert!(matches!(result, Err(DriverError::InvalidGoldenTouchKey)));
    }
}
