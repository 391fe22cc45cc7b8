//! 세션별 시뮬레이션 상태.
//!
//! 각 세션의 현재 시뮬레이션 진행 상태를 추적하는 임시(비영속) 객체입니다.
//! 상태 저장소가 소유하며, 스케줄러만 변경합니다.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use quest_core::{compute_simulated_date, Challenge, ChallengeSession, SimulationError};
use serde::{Deserialize, Serialize};

/// 세션별 시뮬레이션 진행 상태.
///
/// `current_simulation_date`는 누적 전진이 아니라 매 틱
/// `(simulation_started_at, now, speed_factor)`에서 다시 유도됩니다.
/// 프로세스 재시작 시 이 상태는 소실되고 `simulation_started_at`이
/// 리셋되는데, 이는 문서화된 트레이드오프입니다 (저장소 모듈 참조).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSimulationState {
    /// 세션 ID
    pub session_id: i64,
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
    /// 시뮬레이션 시작 시점 (실제 시간)
    pub simulation_started_at: DateTime<Utc>,
    /// 마지막 처리 시점 (실제 시간)
    pub last_processed_at: DateTime<Utc>,
    /// 마지막으로 로깅한 진행률 (10% 단위, 중복 로그 방지용)
    pub last_logged_progress: i32,
}

impl SessionSimulationState {
    /// 세션 첫 관측 시 상태 초기화.
    ///
    /// 챌린지 설정(배속, 기간)을 검증합니다. 세션 시작 서비스가 이미
    /// 검증했어야 하지만, 잘못된 설정이 틱 루프를 오염시키지 않도록
    /// 방어적으로 한 번 더 확인합니다.
    pub fn initialize(
        session: &ChallengeSession,
        challenge: &Challenge,
        now: DateTime<Utc>,
    ) -> Result<Self, SimulationError> {
        challenge.validate_simulation_config()?;

        Ok(Self {
            session_id: session.id,
            challenge_id: challenge.id,
            speed_factor: challenge.speed_factor,
            period_start: challenge.period_start,
            period_end: challenge.period_end,
            current_simulation_date: challenge.period_start,
            simulation_started_at: now,
            last_processed_at: now,
            last_logged_progress: 0,
        })
    }

    /// 현재 시각 기준 시뮬레이션 날짜 재계산.
    pub fn simulated_date_at(&self, now: DateTime<Utc>) -> NaiveDate {
        compute_simulated_date(
            self.simulation_started_at,
            now,
            self.speed_factor,
            self.period_start,
            self.period_end,
        )
    }

    /// 진행률 (0-100%).
    pub fn progress_pct(&self) -> i32 {
        let total_days = (self.period_end - self.period_start).num_days();
        if total_days <= 0 {
            return 100;
        }
        let elapsed_days = (self.current_simulation_date - self.period_start).num_days();
        ((elapsed_days * 100) / total_days).clamp(0, 100) as i32
    }

    /// 시뮬레이션 완료 여부.
    pub fn is_completed(&self) -> bool {
        self.current_simulation_date >= self.period_end
    }

    /// 실제 경과 시간 (분).
    pub fn elapsed_real_minutes(&self) -> i64 {
        (self.last_processed_at - self.simulation_started_at).num_minutes()
    }

    /// 예상 완료 시각.
    ///
    /// 지금까지의 진행 속도를 선형 외삽하여 계산합니다. 진행률이 0이면
    /// 예측할 수 없으므로 `None`을 반환합니다.
    pub fn estimated_completion_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_completed() {
            return Some(now);
        }
        let progress = self.progress_pct();
        if progress <= 0 {
            return None;
        }

        let elapsed_real_ms = (now - self.simulation_started_at).num_milliseconds().max(0);
        let estimated_total_ms = elapsed_real_ms * 100 / progress as i64;
        let remaining_ms = (estimated_total_ms - elapsed_real_ms).max(0);

        Some(now + Duration::milliseconds(remaining_ms))
    }

    /// 한 줄 상태 요약.
    pub fn summary(&self) -> String {
        format!(
            "Session[{}] {}% complete - SimDate: {}, Speed: {}x, Elapsed: {} min",
            self.session_id,
            self.progress_pct(),
            self.current_simulation_date,
            self.speed_factor,
            self.elapsed_real_minutes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quest_core::{ChallengeInstrument, ChallengeStatus, SessionStatus};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn challenge() -> Challenge {
        Challenge {
            id: 10,
            title: "테스트 챌린지".to_string(),
            status: ChallengeStatus::Active,
            speed_factor: 10,
            period_start: date(2020, 1, 1),
            period_end: date(2020, 1, 31),
            instruments: vec![ChallengeInstrument::new("A", "AAPL", "회사 A")],
        }
    }

    fn session() -> ChallengeSession {
        ChallengeSession {
            id: 1,
            challenge_id: 10,
            user_id: 100,
            initial_balance: dec!(1000000),
            current_balance: dec!(1000000),
            return_rate: None,
            status: SessionStatus::Active,
            started_at: Some(now()),
            completed_at: None,
        }
    }

    fn state() -> SessionSimulationState {
        SessionSimulationState::initialize(&session(), &challenge(), now()).unwrap()
    }

    #[test]
    fn test_initialize_rejects_bad_config() {
        let mut bad = challenge();
        bad.speed_factor = 0;
        assert!(SessionSimulationState::initialize(&session(), &bad, now()).is_err());

        let mut inverted = challenge();
        inverted.period_end = date(2019, 1, 1);
        assert!(SessionSimulationState::initialize(&session(), &inverted, now()).is_err());
    }

    #[test]
    fn test_progress_pct() {
        let mut s = state();
        assert_eq!(s.progress_pct(), 0);

        s.current_simulation_date = date(2020, 1, 16);
        assert_eq!(s.progress_pct(), 50);

        s.current_simulation_date = date(2020, 1, 31);
        assert_eq!(s.progress_pct(), 100);
        assert!(s.is_completed());
    }

    #[test]
    fn test_degenerate_period_is_complete() {
        let mut s = state();
        s.period_end = s.period_start;
        assert_eq!(s.progress_pct(), 100);
    }

    #[test]
    fn test_elapsed_real_minutes() {
        let mut s = state();
        s.last_processed_at = now() + Duration::minutes(42);
        assert_eq!(s.elapsed_real_minutes(), 42);
    }

    #[test]
    fn test_estimated_completion_linear_extrapolation() {
        let mut s = state();
        // 1시간 경과, 진행률 50% → 총 2시간 예상, 1시간 남음
        s.current_simulation_date = date(2020, 1, 16);
        let at = now() + Duration::hours(1);
        let eta = s.estimated_completion_at(at).unwrap();
        assert_eq!(eta, at + Duration::hours(1));
    }

    #[test]
    fn test_estimated_completion_unknown_at_zero_progress() {
        let s = state();
        assert!(s.estimated_completion_at(now()).is_none());
    }

    #[test]
    fn test_simulated_date_derivation() {
        let s = state();
        // 10배속, 2.4시간 = 시뮬레이션 1일
        let d = s.simulated_date_at(now() + Duration::seconds(8640));
        assert_eq!(d, date(2020, 1, 2));
    }

    #[test]
    fn test_summary_format() {
        let s = state();
        let summary = s.summary();
        assert!(summary.contains("Session[1]"));
        assert!(summary.contains("Speed: 10x"));
    }
}
