//! Tracks the progress of the P2P beacon sync of the execution engine.

use crate::{metrics::BeaconSyncMetrics, DriverError, TrackerConfig};
use alloy_primitives::B256;
use parking_lot::RwLock;
use std::{sync::Arc, time::Instant};
use taiko_primitives::{BlockInfo, SyncProgress, RESYNC_GAP};
use taiko_providers::L2ChainProvider;
use tokio::task::JoinHandle;

/// The tracked beacon sync, only mutated through the [`SyncProgressTracker`] methods.
#[derive(Debug)]
struct TrackerState {
    /// The last sync progress reported by the engine.
    last_sync_progress: Option<SyncProgress>,
    /// The last time the engine made progress.
    last_progressed: Instant,
    /// The id of the beacon sync target.
    last_synced_block_id: Option<u64>,
    /// The hash of the beacon sync target.
    last_synced_block_hash: Option<B256>,
    /// Whether a beacon sync was triggered.
    triggered: bool,
    /// Whether the engine made no progress within the timeout.
    out_of_sync: bool,
    /// Whether the beacon sync is over.
    finished: bool,
}

impl TrackerState {
    fn new() -> Self {
        Self {
            last_sync_progress: None,
            last_progressed: Instant::now(),
            last_synced_block_id: None,
            last_synced_block_hash: None,
            triggered: false,
            out_of_sync: false,
            finished: false,
        }
    }
}

/// Tracks the beacon sync the driver triggered, marking the engine out of sync once it stopped
/// making progress for longer than the configured timeout.
#[derive(Debug)]
pub struct SyncProgressTracker<L2> {
    /// The L2 execution engine client.
    l2: L2,
    /// The tracker configuration.
    config: TrackerConfig,
    /// The tracked sync.
    state: RwLock<TrackerState>,
    /// The metrics of the tracker.
    metrics: BeaconSyncMetrics,
}

impl<L2: L2ChainProvider> SyncProgressTracker<L2> {
    /// Returns a new untriggered [`SyncProgressTracker`].
    pub fn new(l2: L2, config: TrackerConfig) -> Self {
        Self {
            l2,
            config,
            state: RwLock::new(TrackerState::new()),
            metrics: BeaconSyncMetrics::default(),
        }
    }

    /// Checks the sync progress of the engine once. No-op unless a beacon sync was triggered and
    /// the engine is not already out of sync.
    pub async fn track(&self) {
        if !self.triggered() || self.out_of_sync() {
            return
        }

        let progress = match self.l2.sync_progress().await {
            Ok(progress) => progress,
            Err(err) => {
                tracing::error!(target: "taiko::driver", ?err, "failed to get sync progress");
                return
            }
        };
        let head = if progress.is_none() {
            match self.l2.l2_head().await {
                Ok(head) => Some(head.number),
                Err(err) => {
                    tracing::error!(target: "taiko::driver", ?err, "failed to get L2 head");
                    return
                }
            }
        } else {
            None
        };

        let mut state = self.state.write();
        if let Some(head) = head {
            if state.last_synced_block_id.is_some_and(|id| head >= id) {
                state.last_progressed = Instant::now();
                tracing::info!(
                    target: "taiko::driver",
                    head,
                    target_id = ?state.last_synced_block_id,
                    "engine finished the P2P sync, all missing blocks imported"
                );
                return
            }
            tracing::info!(target: "taiko::driver", head, "engine has not started P2P syncing yet");
        }

        if SyncProgress::progressed(state.last_sync_progress.as_ref(), progress.as_ref()) {
            state.out_of_sync = false;
            state.last_progressed = Instant::now();
        } else if state.last_progressed.elapsed() > self.config.timeout {
            state.out_of_sync = true;
            self.metrics.out_of_sync.set(1.0);
            tracing::warn!(
                target: "taiko::driver",
                timeout = ?self.config.timeout,
                target_id = ?state.last_synced_block_id,
                "engine made no beacon sync progress, marking it out of sync"
            );
        }
        state.last_sync_progress = progress;
    }

    /// Returns true if a new beacon sync must be triggered to reach the block.
    pub async fn need_resync(&self, new_id: u64) -> Result<bool, DriverError> {
        let (triggered, last_synced_block_id, last_sync_progress) = {
            let state = self.state.read();
            (state.triggered, state.last_synced_block_id, state.last_sync_progress)
        };

        if !triggered {
            return Ok(true)
        }
        let Some(id) = last_synced_block_id else { return Ok(true) };
        if new_id.saturating_sub(id) >= RESYNC_GAP {
            return Ok(true)
        }
        if let Some(progress) = last_sync_progress {
            if progress.current_block >= id {
                return Ok(true)
            }
            return Ok(self.l2.l2_head().await?.number >= id)
        }

        Ok(false)
    }
}

impl<L2> SyncProgressTracker<L2> {
    /// Records a new beacon sync target. The progress timeout starts over unless a sync was
    /// already triggered.
    pub fn update_meta(&self, id: u64, hash: B256) {
        let mut state = self.state.write();
        if !state.triggered {
            state.last_progressed = Instant::now();
        }
        state.last_synced_block_id = Some(id);
        state.last_synced_block_hash = Some(hash);
        state.triggered = true;
    }

    /// Resets the tracker once the beacon sync target was reached.
    pub fn clear_meta(&self) {
        let mut state = self.state.write();
        state.triggered = false;
        state.last_synced_block_id = None;
        state.last_synced_block_hash = None;
        state.out_of_sync = false;
        self.metrics.out_of_sync.set(0.0);
    }

    /// Marks the beacon sync as finished.
    pub fn mark_finished(&self) {
        self.state.write().finished = true;
    }

    /// Returns true if the beacon sync is finished.
    pub fn finished(&self) -> bool {
        self.state.read().finished
    }

    /// Returns true if a beacon sync was triggered.
    pub fn triggered(&self) -> bool {
        self.state.read().triggered
    }

    /// Returns true if the engine made no progress within the timeout.
    pub fn out_of_sync(&self) -> bool {
        self.state.read().out_of_sync
    }

    /// Returns the id of the beacon sync target.
    pub fn last_synced_block_id(&self) -> Option<u64> {
        self.state.read().last_synced_block_id
    }

    /// Returns the hash of the beacon sync target.
    pub fn last_synced_block_hash(&self) -> Option<B256> {
        self.state.read().last_synced_block_hash
    }

    /// Returns the beacon sync target.
    pub fn last_synced_block(&self) -> Option<BlockInfo> {
        let state = self.state.read();
        state
            .last_synced_block_id
            .zip(state.last_synced_block_hash)
            .map(|(id, hash)| BlockInfo::new(id, hash))
    }
}

impl<L2: L2ChainProvider + 'static> SyncProgressTracker<L2> {
    /// Spawns the task checking the sync progress at the configured interval.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tracker.config.interval);
            loop {
                interval.tick().await;
                tracker.track().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use taiko_engine::test_utils::MockL2Node;

    fn tracker(l2: MockL2Node, timeout: Duration) -> SyncProgressTracker<MockL2Node> {
        SyncProgressTracker::new(l2, TrackerConfig { timeout, interval: Duration::from_millis(1) })
    }

    #[tokio::test]
    async fn test_should_need_resync_when_untriggered() -> eyre::Result<()> {
        let tracker = tracker(MockL2Node::new(), Duration::from_secs(60));

        assert!(tracker.need_resync(0).await?);
        assert!(tracker.need_resync(10).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_need_resync_past_gap() -> eyre::Result<()> {
        // Given
        let tracker = tracker(MockL2Node::new(), Duration::from_secs(60));
        tracker.update_meta(100, B256::repeat_byte(1));

        // Then
        for gap in 0..RESYNC_GAP {
            assert!(!tracker.need_resync(100 + gap).await?, "gap {gap}");
        }
        assert!(tracker.need_resync(100 + RESYNC_GAP).await?);
        assert!(tracker.need_resync(100 + RESYNC_GAP + 1).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_need_resync_when_progress_reached_target() -> eyre::Result<()> {
        // Given
        let l2 = MockL2Node::new();
        let tracker = tracker(l2.clone(), Duration::from_secs(60));
        tracker.update_meta(10, B256::repeat_byte(1));
        l2.set_sync_progress(Some(SyncProgress { current_block: 4, ..Default::default() }));
        tracker.track().await;
        assert!(!tracker.need_resync(11).await?);

        // When
        l2.set_sync_progress(Some(SyncProgress { current_block: 10, ..Default::default() }));
        tracker.track().await;

        // Then
        assert!(tracker.need_resync(11).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_should_mark_out_of_sync_without_progress() {
        // Given
        let l2 = MockL2Node::new();
        let progress = SyncProgress { current_block: 3, ..Default::default() };
        l2.set_sync_progress(Some(progress));
        let tracker = tracker(l2.clone(), Duration::ZERO);
        tracker.update_meta(10, B256::repeat_byte(1));

        // When
        tokio::time::sleep(Duration::from_millis(2)).await;
        tracker.track().await;

        // Then
        assert!(tracker.out_of_sync());

        // When
        tracker.clear_meta();

        // Then
        assert!(!tracker.out_of_sync());
        assert!(!tracker.triggered());
        assert_eq!(tracker.last_synced_block(), None);
    }

    #[tokio::test]
    async fn test_should_stay_in_sync_while_progressing() {
        // Given
        let l2 = MockL2Node::new();
        let tracker = tracker(l2.clone(), Duration::from_millis(50));
        tracker.update_meta(1_000, B256::repeat_byte(1));

        // When
        for block in 1..5 {
            l2.set_sync_progress(Some(SyncProgress { current_block: block, ..Default::default() }));
            tracker.track().await;
        }

        // Then
        assert!(!tracker.out_of_sync());
        assert!(tracker.triggered());
    }

    #[tokio::test]
    async fn test_should_skip_untriggered_tracker() {
        let l2 = MockL2Node::new();
        let tracker = tracker(l2, Duration::ZERO);

        tracker.track().await;

        assert!(!tracker.out_of_sync());
        assert!(!tracker.triggered());
    }
}
