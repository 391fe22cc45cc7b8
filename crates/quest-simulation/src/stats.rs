//! 시뮬레이션 운영 통계.

use std::collections::HashMap;

use serde::Serialize;

use crate::state::SessionSimulationState;

/// 단일 세션 진행 요약.
#[derive(Debug, Clone, Serialize)]
pub struct SessionProgress {
    /// 세션 ID
    pub session_id: i64,
    /// 진행률 (0-100%)
    pub progress_pct: i32,
}

/// 활성 시뮬레이션 집계 통계.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatistics {
    /// 활성 시뮬레이션 수
    pub active_sessions: usize,
    /// 평균 진행률 (%)
    pub average_progress_pct: f64,
    /// 평균 실제 경과 시간 (분)
    pub average_elapsed_minutes: f64,
    /// Speed Factor 분포 (배속 → 세션 수)
    pub speed_factor_distribution: HashMap<i32, usize>,
    /// 가장 진행이 빠른 세션
    pub fastest_session: Option<SessionProgress>,
    /// 가장 진행이 느린 세션
    pub slowest_session: Option<SessionProgress>,
}

impl SimulationStatistics {
    /// 상태 스냅샷에서 통계 집계.
    pub fn from_states(states: &[SessionSimulationState]) -> Self {
        if states.is_empty() {
            return Self {
                active_sessions: 0,
                average_progress_pct: 0.0,
                average_elapsed_minutes: 0.0,
                speed_factor_distribution: HashMap::new(),
                fastest_session: None,
                slowest_session: None,
            };
        }

        let count = states.len();
        let total_progress: i64 = states.iter().map(|s| s.progress_pct() as i64).sum();
        let total_elapsed: i64 = states.iter().map(|s| s.elapsed_real_minutes()).sum();

        let mut speed_factor_distribution: HashMap<i32, usize> = HashMap::new();
        for state in states {
            *speed_factor_distribution.entry(state.speed_factor).or_default() += 1;
        }

        let fastest = states.iter().max_by_key(|s| s.progress_pct());
        let slowest = states.iter().min_by_key(|s| s.progress_pct());

        Self {
            active_sessions: count,
            average_progress_pct: total_progress as f64 / count as f64,
            average_elapsed_minutes: total_elapsed as f64 / count as f64,
            speed_factor_distribution,
            fastest_session: fastest.map(|s| SessionProgress {
                session_id: s.session_id,
                progress_pct: s.progress_pct(),
            }),
            slowest_session: slowest.map(|s| SessionProgress {
                session_id: s.session_id,
                progress_pct: s.progress_pct(),
            }),
        }
    }

    /// 통계 요약 로그 출력.
    pub fn log_summary(&self) {
        tracing::info!(
            active_sessions = self.active_sessions,
            average_progress = format!("{:.1}%", self.average_progress_pct),
            average_elapsed_minutes = format!("{:.1}", self.average_elapsed_minutes),
            "시뮬레이션 통계"
        );
    }
}
