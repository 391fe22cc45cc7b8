//! 시뮬레이션 상태 조회 API 엔드포인트.
//!
//! 개발/관리 목적의 시뮬레이션 상태 조회 및 통계를 제공합니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/admin/simulation/sessions/{session_id}/state` - 특정 세션 상태 조회
//! - `GET /api/admin/simulation/states` - 모든 활성 시뮬레이션 상태 조회
//! - `GET /api/admin/simulation/statistics` - 집계 통계 조회

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use quest_simulation::SessionSimulationState;

use crate::state::AppState;

// ==================== 응답 DTO ====================

/// 단일 세션의 시뮬레이션 상태 스냅샷.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SimulationStateDto {
    /// 소속 챌린지 ID
    pub challenge_id: i64,
    /// 시간 가속 배율
    pub speed_factor: i32,
    /// 시뮬레이션 시작일
    pub period_start: NaiveDate,
    /// 시뮬레이션 종료일
    pub period_end: NaiveDate,
    /// 현재 시뮬레이션 날짜
    pub current_simulation_date: NaiveDate,
    /// 진행률 (예: "43.0%")
    pub progress: String,
    /// 완료 여부
    pub is_completed: bool,
    /// 시뮬레이션 시작 시점 (실제 시간)
    pub simulation_started_at: DateTime<Utc>,
    /// 실제 경과 시간 (분)
    pub elapsed_real_time_minutes: i64,
    /// 예상 완료 시각 (진행률 0%면 예측 불가)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion_time: Option<DateTime<Utc>>,
    /// 한 줄 요약
    pub summary: String,
}

impl SimulationStateDto {
    fn from_state(state: &SessionSimulationState, now: DateTime<Utc>) -> Self {
        Self {
            challenge_id: state.challenge_id,
            speed_factor: state.speed_factor,
            period_start: state.period_start,
            period_end: state.period_end,
            current_simulation_date: state.current_simulation_date,
            progress: format!("{:.1}%", state.progress_pct() as f64),
            is_completed: state.is_completed(),
            simulation_started_at: state.simulation_started_at,
            elapsed_real_time_minutes: state.elapsed_real_minutes(),
            estimated_completion_time: state.estimated_completion_at(now),
            summary: state.summary(),
        }
    }
}

/// 특정 세션 상태 조회 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionStateResponse {
    /// 조회한 세션 ID
    pub session_id: i64,
    /// 상태 존재 여부
    pub found: bool,
    /// 시뮬레이션 상태 (없으면 생략)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<SimulationStateDto>,
    /// 안내 메시지 (상태가 없을 때)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 전체 상태 조회 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AllStatesResponse {
    /// 추적 중인 세션 수
    pub total_sessions: usize,
    /// 세션 ID → 상태
    pub states: HashMap<String, SimulationStateDto>,
}

/// 세션 진행 요약.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionProgressDto {
    /// 세션 ID
    pub session_id: i64,
    /// 진행률 (예: "43.0%")
    pub progress: String,
}

/// 집계 통계 응답.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatisticsResponse {
    /// 활성 시뮬레이션 수
    pub active_sessions: usize,
    /// 평균 진행률 (예: "43.0%")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_progress: Option<String>,
    /// 평균 실제 경과 시간 (분)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_elapsed_minutes: Option<String>,
    /// Speed Factor 분포 (배속 → 세션 수)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_factor_distribution: Option<HashMap<i32, usize>>,
    /// 가장 진행이 빠른 세션
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_session: Option<SessionProgressDto>,
    /// 가장 진행이 느린 세션
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest_session: Option<SessionProgressDto>,
}

// ==================== 핸들러 ====================

/// 특정 세션의 시뮬레이션 상태 조회
#[utoipa::path(
    get,
    path = "/api/admin/simulation/sessions/{session_id}/state",
    tag = "simulation-admin",
    params(
        ("session_id" = i64, Path, description = "세션 ID")
    ),
    responses(
        (status = 200, description = "조회 성공 (상태가 없어도 200, found=false)", body = SessionStateResponse),
    )
)]
pub async fn get_session_state(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<i64>,
) -> Json<SessionStateResponse> {
    tracing::info!(session_id = session_id, "세션 시뮬레이션 상태 조회");

    let now = state.engine.now();
    match state.engine.state_of(session_id).await {
        Some(simulation_state) => Json(SessionStateResponse {
            session_id,
            found: true,
            state: Some(SimulationStateDto::from_state(&simulation_state, now)),
            message: None,
        }),
        None => Json(SessionStateResponse {
            session_id,
            found: false,
            state: None,
            message: Some("해당 세션의 시뮬레이션 상태가 없습니다".to_string()),
        }),
    }
}

/// 모든 활성 시뮬레이션 상태 조회
#[utoipa::path(
    get,
    path = "/api/admin/simulation/states",
    tag = "simulation-admin",
    responses(
        (status = 200, description = "조회 성공", body = AllStatesResponse),
    )
)]
pub async fn get_all_states(State(state): State<Arc<AppState>>) -> Json<AllStatesResponse> {
    tracing::info!("모든 시뮬레이션 상태 조회");

    let now = state.engine.now();
    let all_states = state.engine.all_states().await;

    let states: HashMap<String, SimulationStateDto> = all_states
        .iter()
        .map(|s| {
            (
                s.session_id.to_string(),
                SimulationStateDto::from_state(s, now),
            )
        })
        .collect();

    Json(AllStatesResponse {
        total_sessions: states.len(),
        states,
    })
}

/// 시뮬레이션 통계 정보 조회
#[utoipa::path(
    get,
    path = "/api/admin/simulation/statistics",
    tag = "simulation-admin",
    responses(
        (status = 200, description = "조회 성공", body = StatisticsResponse),
    )
)]
pub async fn get_statistics(State(state): State<Arc<AppState>>) -> Json<StatisticsResponse> {
    tracing::info!("시뮬레이션 통계 조회");

    let stats = state.engine.statistics().await;

    if stats.active_sessions == 0 {
        return Json(StatisticsResponse {
            active_sessions: 0,
            average_progress: None,
            average_elapsed_minutes: None,
            speed_factor_distribution: None,
            fastest_session: None,
            slowest_session: None,
        });
    }

    Json(StatisticsResponse {
        active_sessions: stats.active_sessions,
        average_progress: Some(format!("{:.1}%", stats.average_progress_pct)),
        average_elapsed_minutes: Some(format!("{:.1}", stats.average_elapsed_minutes)),
        speed_factor_distribution: Some(stats.speed_factor_distribution),
        fastest_session: stats.fastest_session.map(|s| SessionProgressDto {
            session_id: s.session_id,
            progress: format!("{:.1}%", s.progress_pct as f64),
        }),
        slowest_session: stats.slowest_session.map(|s| SessionProgressDto {
            session_id: s.session_id,
            progress: format!("{:.1}%", s.progress_pct as f64),
        }),
    })
}

/// 시뮬레이션 관리 라우트 구성.
pub fn simulation_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/admin/simulation/sessions/{session_id}/state",
            get(get_session_state),
        )
        .route("/api/admin/simulation/states", get(get_all_states))
        .route("/api/admin/simulation/statistics", get(get_statistics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn state() -> SessionSimulationState {
        let started = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        SessionSimulationState {
            session_id: 1,
            challenge_id: 10,
            speed_factor: 10,
            period_start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2020, 1, 31).unwrap(),
            current_simulation_date: NaiveDate::from_ymd_opt(2020, 1, 16).unwrap(),
            simulation_started_at: started,
            last_processed_at: started + Duration::hours(1),
            last_logged_progress: 50,
        }
    }

    #[test]
    fn test_state_dto_conversion() {
        let s = state();
        let now = s.simulation_started_at + Duration::hours(1);
        let dto = SimulationStateDto::from_state(&s, now);

        assert_eq!(dto.challenge_id, 10);
        assert_eq!(dto.progress, "50.0%");
        assert!(!dto.is_completed);
        assert_eq!(dto.elapsed_real_time_minutes, 60);
        // 진행률 50% → 총 2시간 예상, 1시간 남음
        assert_eq!(dto.estimated_completion_time, Some(now + Duration::hours(1)));
        assert!(dto.summary.contains("Session[1]"));
    }

    #[test]
    fn test_state_dto_serializes_without_eta_when_unknown() {
        let mut s = state();
        s.current_simulation_date = s.period_start; // 진행률 0% → ETA 예측 불가
        let dto = SimulationStateDto::from_state(&s, s.simulation_started_at);

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("estimated_completion_time").is_none());
        assert_eq!(json["progress"], "0.0%");
    }
}
