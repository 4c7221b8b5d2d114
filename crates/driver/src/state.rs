//! The L1 and L2 cursors shared by the driver components.

use crate::{DriverError, DriverMetrics};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::Address;
use alloy_rpc_types_eth::{Filter, Header};
use alloy_sol_types::SolEvent;
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use taiko_l1::{try_decode_log, ITaikoInbox};
use taiko_primitives::{BlockInfo, ForkHeights};
use taiko_providers::{L1ChainProvider, L1OriginProvider, L2ChainProvider};
use tokio::{sync::broadcast, task::JoinHandle};

/// The interval between two polls of the L1 and L2 heads.
#[cfg(any(test, feature = "test-utils"))]
pub const STATE_POLL_INTERVAL: Duration = Duration::from_millis(1);
/// The interval between two polls of the L1 and L2 heads.
#[cfg(not(any(test, feature = "test-utils")))]
pub const STATE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The capacity of the L1 heads feed.
const L1_HEADS_CAPACITY: usize = 64;

/// The cursors of the driver: the L1 and L2 heads, kept up to date by the event loop, and the L1
/// block up to which proposals were processed.
#[derive(Debug)]
pub struct State<L1, L2> {
    /// The L1 execution client.
    l1: L1,
    /// The L2 execution engine client.
    l2: L2,
    /// The address of the Taiko inbox.
    inbox: Address,
    /// The latest L1 head.
    l1_head: RwLock<Header>,
    /// The latest L2 head.
    l2_head: RwLock<Header>,
    /// The L1 block up to which proposals were processed.
    l1_current: RwLock<Header>,
    /// The L1 block the inbox was deployed in.
    genesis_l1_header: Header,
    /// The fork activation heights.
    fork_heights: ForkHeights,
    /// The feed of new L1 heads.
    l1_heads: broadcast::Sender<BlockInfo>,
    /// The metrics of the driver.
    metrics: DriverMetrics,
}

impl<L1, L2> State<L1, L2>
where
    L1: L1ChainProvider,
    L2: L2ChainProvider + L1OriginProvider,
{
    /// Returns a new [`State`]. The genesis L1 header must be available, the initial L1 cursor is
    /// the L1 block recorded in the head L1 origin of the L2 chain.
    pub async fn new(
        l1: L1,
        l2: L2,
        inbox: Address,
        genesis_l1_height: u64,
        fork_heights: ForkHeights,
    ) -> Result<Self, DriverError> {
        let genesis_l1_header = l1
            .l1_header_by_number(genesis_l1_height.into())
            .await?
            .ok_or(DriverError::MissingL1Header(genesis_l1_height))?;
        let l1_head = l1
            .l1_header_by_number(BlockNumberOrTag::Latest)
            .await?
            .unwrap_or_else(|| genesis_l1_header.clone());
        let l2_head = l2.l2_head().await?;

        let (l1_heads, _) = broadcast::channel(L1_HEADS_CAPACITY);
        let state = Self {
            l1,
            l2,
            inbox,
            l1_head: RwLock::new(l1_head.clone()),
            l2_head: RwLock::new(l2_head.clone()),
            l1_current: RwLock::new(genesis_l1_header.clone()),
            genesis_l1_header,
            fork_heights,
            l1_heads,
            metrics: DriverMetrics::default(),
        };
        state.metrics.l1_head_height.set(l1_head.number as f64);
        state.metrics.l2_head_height.set(l2_head.number as f64);

        let l1_current = state.latest_l2_known_l1_header().await?;
        state.set_l1_current(l1_current);

        tracing::info!(
            target: "taiko::driver",
            genesis_l1_height,
            l1_head = %BlockInfo::from(&state.l1_head()),
            l2_head = %BlockInfo::from(&state.l2_head()),
            l1_current = %BlockInfo::from(&state.l1_current()),
            "driver state initialized"
        );
        Ok(state)
    }

    /// Returns the L1 header of the head L1 origin of the L2 chain, falling back to the genesis
    /// L1 header when there is none or the L1 block was reorged away.
    async fn latest_l2_known_l1_header(&self) -> Result<Header, DriverError> {
        let Some(origin) = self.l2.head_l1_origin().await? else {
            tracing::warn!(target: "taiko::driver", "head L1 origin not found, using genesis L1 header");
            return Ok(self.genesis_l1_header.clone())
        };
        let Some(hash) = origin.l1_block_hash else {
            tracing::warn!(target: "taiko::driver", block_id = origin.block_id, "head L1 origin has no L1 block, using genesis L1 header");
            return Ok(self.genesis_l1_header.clone())
        };

        match self.l1.l1_header_by_hash(hash).await? {
            Some(header) => Ok(header),
            None => {
                tracing::warn!(
                    target: "taiko::driver",
                    ?hash,
                    block_id = origin.block_id,
                    "L1 block of the head L1 origin not found, using genesis L1 header"
                );
                Ok(self.genesis_l1_header.clone())
            }
        }
    }

    /// Returns the latest L1 head.
    pub fn l1_head(&self) -> Header {
        self.l1_head.read().clone()
    }

    /// Returns the latest L2 head.
    pub fn l2_head(&self) -> Header {
        self.l2_head.read().clone()
    }

    /// Returns the L1 block up to which proposals were processed.
    pub fn l1_current(&self) -> Header {
        self.l1_current.read().clone()
    }

    /// Returns the L1 block the inbox was deployed in.
    pub const fn genesis_l1_header(&self) -> &Header {
        &self.genesis_l1_header
    }

    /// Returns the height of the L1 block the inbox was deployed in.
    pub fn genesis_l1_height(&self) -> u64 {
        self.genesis_l1_header.number
    }

    /// Returns the fork activation heights.
    pub const fn fork_heights(&self) -> ForkHeights {
        self.fork_heights
    }

    /// Returns a receiver of the new L1 heads.
    pub fn subscribe_l1_heads(&self) -> broadcast::Receiver<BlockInfo> {
        self.l1_heads.subscribe()
    }

    /// Moves the L1 cursor.
    pub fn set_l1_current(&self, header: Header) {
        self.metrics.l1_current_height.set(header.number as f64);
        tracing::debug!(target: "taiko::driver", l1_current = %BlockInfo::from(&header), "L1 cursor moved");
        *self.l1_current.write() = header;
    }

    /// Rewinds the L1 cursor to the L1 block recorded in the L1 origin of the L2 block, or to the
    /// genesis L1 block for block 0.
    pub async fn reset_l1_current(&self, block_id: u64) -> Result<Header, DriverError> {
        let header = if block_id == 0 {
            self.genesis_l1_header.clone()
        } else {
            let height = self
                .l2
                .l1_origin_by_id(block_id)
                .await?
                .and_then(|origin| origin.l1_block_height)
                .ok_or(DriverError::MissingL1Origin(block_id))?;
            self.l1
                .l1_header_by_number(height.into())
                .await?
                .ok_or(DriverError::MissingL1Header(height))?
        };

        tracing::info!(target: "taiko::driver", block_id, l1_current = %BlockInfo::from(&header), "reset L1 cursor");
        self.set_l1_current(header.clone());
        Ok(header)
    }

    fn set_l1_head(&self, header: Header) {
        let info = BlockInfo::from(&header);
        self.metrics.l1_head_height.set(header.number as f64);
        *self.l1_head.write() = header;
        // no subscriber is not an error.
        let _ = self.l1_heads.send(info);
    }

    fn set_l2_head(&self, header: Header) {
        self.metrics.l2_head_height.set(header.number as f64);
        *self.l2_head.write() = header;
    }

    /// Polls the L1 and L2 heads once, publishing a changed L1 head and logging the inbox proving
    /// events emitted since the previous L1 head.
    pub async fn poll(&self) -> Result<(), DriverError> {
        if let Some(head) = self.l1.l1_header_by_number(BlockNumberOrTag::Latest).await? {
            let previous = self.l1_head();
            if head.hash != previous.hash {
                let from = if head.number > previous.number { previous.number + 1 } else { head.number };
                self.log_protocol_events(from, head.number).await?;
                tracing::trace!(target: "taiko::driver", l1_head = %BlockInfo::from(&head), "new L1 head");
                self.set_l1_head(head);
            }
        }
        if let Some(head) = self.l2.l2_header_by_number(BlockNumberOrTag::Latest).await? {
            self.set_l2_head(head);
        }
        Ok(())
    }

    async fn log_protocol_events(&self, from: u64, to: u64) -> Result<(), DriverError> {
        let filter = Filter::new()
            .address(self.inbox)
            .event_signature(vec![
                ITaikoInbox::BatchesProved::SIGNATURE_HASH,
                ITaikoInbox::BatchesVerified::SIGNATURE_HASH,
                ITaikoInbox::TransitionProvedV2::SIGNATURE_HASH,
            ])
            .from_block(from)
            .to_block(to);

        for log in self.l1.l1_logs(&filter).await? {
            let height = log.block_number.unwrap_or_default();
            if let Some(event) = try_decode_log::<ITaikoInbox::BatchesProved>(&log.inner) {
                tracing::info!(target: "taiko::driver", height, batch_ids = ?event.data.batchIds, "batches proved");
            } else if let Some(event) = try_decode_log::<ITaikoInbox::BatchesVerified>(&log.inner) {
                tracing::info!(
                    target: "taiko::driver",
                    height,
                    batch_id = event.data.batchId,
                    block_hash = ?event.data.blockHash,
                    "batches verified"
                );
            } else if let Some(event) = try_decode_log::<ITaikoInbox::TransitionProvedV2>(&log.inner)
            {
                tracing::info!(
                    target: "taiko::driver",
                    height,
                    block_id = %event.data.blockId,
                    block_hash = ?event.data.tran.blockHash,
                    "transition proved"
                );
            }
        }
        Ok(())
    }
}

impl<L1, L2> State<L1, L2>
where
    L1: L1ChainProvider + 'static,
    L2: L2ChainProvider + L1OriginProvider + 'static,
{
    /// Spawns the event loop polling the L1 and L2 heads.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let state = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(err) = state.poll().await {
                    tracing::warn!(target: "taiko::driver", ?err, "failed to poll chain heads");
                }
                tokio::time::sleep(STATE_POLL_INTERVAL).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use taiko_engine::test_utils::MockL2Node;
    use taiko_primitives::L1Origin;
    use taiko_providers::test_utils::MockL1Provider;

    #[tokio::test]
    async fn test_should_start_from_genesis_without_head_origin() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        for _ in 0..5 {
            l1.push_block(vec![]);
        }

        // When
        let state = State::new(l1.clone(), MockL2Node::new(), Address::ZERO, 2, ForkHeights::default())
            .await?;

        // Then
        assert_eq!(state.l1_current().number, 2);
        assert_eq!(state.l1_head().number, 5);
        assert_eq!(state.genesis_l1_height(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_start_from_head_origin() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        let origin_block = l1.push_block(vec![]);
        l1.push_block(vec![]);
        let l2 = MockL2Node::new();
        l2.update_l1_origin(&L1Origin::new(1, origin_block.number, origin_block.hash)).await?;
        l2.set_head_l1_origin(1).await?;

        // When
        let state = State::new(l1, l2, Address::ZERO, 0, ForkHeights::default()).await?;

        // Then
        assert_eq!(state.l1_current().hash, origin_block.hash);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_fall_back_to_genesis_when_origin_reorged() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        l1.push_block(vec![]);
        let l2 = MockL2Node::new();
        l2.update_l1_origin(&L1Origin::new(1, 1, B256::repeat_byte(0xaa))).await?;
        l2.set_head_l1_origin(1).await?;

        // When
        let state = State::new(l1, l2, Address::ZERO, 0, ForkHeights::default()).await?;

        // Then
        assert_eq!(state.l1_current().number, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_publish_new_l1_heads() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        let state = State::new(l1.clone(), MockL2Node::new(), Address::ZERO, 0, ForkHeights::default())
            .await?;
        let mut heads = state.subscribe_l1_heads();

        // When
        let head = l1.push_block(vec![]);
        state.poll().await?;
        state.poll().await?;

        // Then
        assert_eq!(heads.recv().await?, BlockInfo::from(&head));
        assert!(heads.try_recv().is_err());
        assert_eq!(state.l1_head().hash, head.hash);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_reset_l1_current() -> eyre::Result<()> {
        // Given
        let l1 = MockL1Provider::new();
        let origin_block = l1.push_block(vec![]);
        l1.push_block(vec![]);
        let l2 = MockL2Node::new();
        l2.update_l1_origin(&L1Origin::new(7, origin_block.number, origin_block.hash)).await?;
        let state = State::new(l1.clone(), l2, Address::ZERO, 0, ForkHeights::default()).await?;
        state.set_l1_current(l1.head());

        // When
        let reset = state.reset_l1_current(7).await?;

        // Then
        assert_eq!(reset.hash, origin_block.hash);
        assert_eq!(state.l1_current().hash, origin_block.hash);
        assert_eq!(state.reset_l1_current(0).await?.number, 0);
        assert!(matches!(state.reset_l1_current(8).await, Err(DriverError::MissingL1Origin(8))));

        Ok(())
    }
}
