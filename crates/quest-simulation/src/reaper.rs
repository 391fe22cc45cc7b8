//! 방치된 시뮬레이션 상태 정리.
//!
//! 종료 경로가 정리를 못 한 상태(프로세스 재시작 중 틱 중단 등)로 인한
//! 메모리 누수를 막는 안전망입니다. 정상 경로의 일부가 아니며, 아직 틱을
//! 받고 있는 세션의 상태는 절대 제거하지 않습니다.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

use quest_core::Clock;

use crate::store::SimulationStateStore;

/// 상태 정리 태스크.
pub struct StateReaper {
    store: Arc<dyn SimulationStateStore>,
    clock: Arc<dyn Clock>,
    stale_threshold: Duration,
}

impl StateReaper {
    /// 새 리퍼 생성.
    pub fn new(
        store: Arc<dyn SimulationStateStore>,
        clock: Arc<dyn Clock>,
        stale_threshold: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            stale_threshold,
        }
    }

    /// 오래된 상태 일괄 제거.
    ///
    /// `last_processed_at`이 기준 시간보다 오래된 항목만 제거하고 건수를
    /// 반환합니다.
    pub async fn sweep(&self) -> usize {
        debug!("시뮬레이션 상태 정리 시작");

        let cutoff = self.clock.now() - self.stale_threshold;
        let evicted = self.store.evict_stale(cutoff).await;

        for state in &evicted {
            debug!(
                session_id = state.session_id,
                last_processed = %state.last_processed_at,
                "오래된 시뮬레이션 상태 제거"
            );
        }

        if !evicted.is_empty() {
            info!(removed = evicted.len(), "시뮬레이션 상태 정리 완료");
        }

        evicted.len()
    }
}
