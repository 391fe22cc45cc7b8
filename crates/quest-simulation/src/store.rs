//! 시뮬레이션 상태 저장소.
//!
//! 세션 ID를 키로 하는 임시 상태 테이블입니다. 틱 프로세서, 리퍼, 조회
//! API가 공유하는 유일한 가변 구조이며, trait 뒤에 숨겨 다중 인스턴스
//! 배포에서 분산 캐시 구현으로 교체할 수 있게 합니다.
//!
//! 기본 구현([`InMemoryStateStore`])은 프로세스 재시작 시 내용을 잃습니다.
//! 시뮬레이션 날짜가 영속 필드에서 재유도되는 파생 값이므로 이는 허용된
//! 트레이드오프입니다. 단, 재시작 후 `simulation_started_at`이 리셋되어
//! 해당 세션의 경과 진행분도 처음부터 다시 재생됩니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::state::SessionSimulationState;

/// 시뮬레이션 상태 저장소 trait.
///
/// 항목 간 잠금은 필요하지 않습니다. 틱은 한 번에 한 세션의 항목만 다루고,
/// 항목이 컴포넌트 간에 공유되지 않기 때문입니다.
#[async_trait]
pub trait SimulationStateStore: Send + Sync {
    /// 세션 상태 조회.
    async fn get(&self, session_id: i64) -> Option<SessionSimulationState>;

    /// 세션 상태 저장 (있으면 덮어씀).
    async fn put(&self, state: SessionSimulationState);

    /// 세션 상태 제거.
    async fn remove(&self, session_id: i64) -> Option<SessionSimulationState>;

    /// 전체 상태 스냅샷 (관리/통계용).
    async fn snapshot_all(&self) -> Vec<SessionSimulationState>;

    /// `last_processed_at`이 기준 시각보다 오래된 항목 일괄 제거.
    ///
    /// 제거된 항목을 반환합니다 (리퍼가 건별 로깅에 사용).
    async fn evict_stale(&self, cutoff: DateTime<Utc>) -> Vec<SessionSimulationState>;

    /// 현재 추적 중인 세션 수.
    async fn active_count(&self) -> usize;
}

/// 인메모리 상태 저장소.
///
/// 단일 인스턴스 배포용 기본 구현. `tokio::sync::RwLock`으로 다중 읽기 /
/// 단일 쓰기를 보장합니다.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: RwLock<HashMap<i64, SessionSimulationState>>,
}

impl InMemoryStateStore {
    /// 빈 저장소 생성.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SimulationStateStore for InMemoryStateStore {
    async fn get(&self, session_id: i64) -> Option<SessionSimulationState> {
        self.entries.read().await.get(&session_id).cloned()
    }

    async fn put(&self, state: SessionSimulationState) {
        self.entries.write().await.insert(state.session_id, state);
    }

    async fn remove(&self, session_id: i64) -> Option<SessionSimulationState> {
        self.entries.write().await.remove(&session_id)
    }

    async fn snapshot_all(&self) -> Vec<SessionSimulationState> {
        self.entries.read().await.values().cloned().collect()
    }

    async fn evict_stale(&self, cutoff: DateTime<Utc>) -> Vec<SessionSimulationState> {
        let mut entries = self.entries.write().await;
        let stale_ids: Vec<i64> = entries
            .values()
            .filter(|state| state.last_processed_at < cutoff)
            .map(|state| state.session_id)
            .collect();

        stale_ids
            .into_iter()
            .filter_map(|id| entries.remove(&id))
            .collect()
    }

    async fn active_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn state(session_id: i64, last_processed_at: DateTime<Utc>) -> SessionSimulationState {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        SessionSimulationState {
            session_id,
            challenge_id: 10,
            speed_factor: 10,
            period_start: start,
            period_end: NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
            current_simulation_date: start,
            simulation_started_at: last_processed_at,
            last_processed_at,
            last_logged_progress: 0,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = InMemoryStateStore::new();
        assert!(store.get(1).await.is_none());

        store.put(state(1, now())).await;
        assert_eq!(store.get(1).await.unwrap().session_id, 1);
        assert_eq!(store.active_count().await, 1);

        let removed = store.remove(1).await;
        assert!(removed.is_some());
        assert!(store.get(1).await.is_none());
        assert!(store.remove(1).await.is_none());
    }

    #[tokio::test]
    async fn test_evict_stale_keeps_fresh_entries() {
        let store = InMemoryStateStore::new();
        store.put(state(1, now() - Duration::hours(3))).await;
        store.put(state(2, now() - Duration::minutes(5))).await;

        let evicted = store.evict_stale(now() - Duration::hours(2)).await;
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].session_id, 1);

        // 최근 처리된 항목은 유지
        assert!(store.get(2).await.is_some());
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_all() {
        let store = InMemoryStateStore::new();
        store.put(state(1, now())).await;
        store.put(state(2, now())).await;

        let mut ids: Vec<i64> = store
            .snapshot_all()
            .await
            .into_iter()
            .map(|s| s.session_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }
}
