//! 챌린지 세션 도메인 엔티티.
//!
//! 특정 사용자의 특정 챌린지 참여 세션. 자체 잔고와 시뮬레이션 시계를 가집니다.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

/// 세션 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// 생성됨, 아직 시작되지 않음
    Ready,
    /// 활성화됨, 거래 가능
    Active,
    /// 정상 완료됨, 거래 불가
    Completed,
    /// 사용자가 취소함, 거래 불가
    Cancelled,
    /// 종료됨 (레거시 지원)
    Ended,
}

impl SessionStatus {
    /// 상태 설명 (한국어).
    pub fn description(&self) -> &'static str {
        match self {
            Self::Ready => "준비",
            Self::Active => "진행중",
            Self::Completed => "완료",
            Self::Cancelled => "취소",
            Self::Ended => "종료",
        }
    }

    /// 진행 중 여부.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// 종결 상태 여부.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Ended)
    }
}

/// 챌린지 세션 엔티티.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeSession {
    /// 세션 ID
    pub id: i64,
    /// 소속 챌린지 ID
    pub challenge_id: i64,
    /// 참여 사용자 ID
    pub user_id: i64,
    /// 시작 자금
    pub initial_balance: Decimal,
    /// 현재 현금 잔고
    pub current_balance: Decimal,
    /// 최종 수익률 (%) - 종료 시 계산됨
    pub return_rate: Option<Decimal>,
    /// 상태
    pub status: SessionStatus,
    /// 시작 시각
    pub started_at: Option<DateTime<Utc>>,
    /// 종료 시각
    pub completed_at: Option<DateTime<Utc>>,
}

impl ChallengeSession {
    /// 세션 시작 (READY → ACTIVE).
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), SimulationError> {
        if self.status != SessionStatus::Ready {
            return Err(SimulationError::InvalidSessionTransition(
                "준비 상태의 세션만 시작할 수 있습니다".to_string(),
            ));
        }
        self.status = SessionStatus::Active;
        self.started_at = Some(now);
        Ok(())
    }

    /// 세션 종료 (ACTIVE → COMPLETED).
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), SimulationError> {
        if self.status != SessionStatus::Active {
            return Err(SimulationError::InvalidSessionTransition(
                "진행 중인 세션만 종료할 수 있습니다".to_string(),
            ));
        }
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// 세션 취소 (READY/ACTIVE → CANCELLED).
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), SimulationError> {
        if self.status != SessionStatus::Active && self.status != SessionStatus::Ready {
            return Err(SimulationError::InvalidSessionTransition(
                "진행 중이거나 준비 상태의 세션만 취소할 수 있습니다".to_string(),
            ));
        }
        self.status = SessionStatus::Cancelled;
        self.completed_at = Some(now);
        Ok(())
    }

    /// 진행 중 여부.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// 총 손익 계산 (포트폴리오 평가액 + 현금 - 시작 자금).
    pub fn calculate_total_pnl(&self, portfolio_value: Decimal) -> Decimal {
        portfolio_value + self.current_balance - self.initial_balance
    }

    /// 수익률 계산 및 기록 (%).
    ///
    /// `(포트폴리오 평가액 + 현금 잔고 - 시작 자금) / 시작 자금`을 소수점
    /// 4자리 반올림(half-up) 후 백분율로 환산합니다.
    pub fn calculate_return_percentage(&mut self, portfolio_value: Decimal) -> Decimal {
        let total_value = portfolio_value + self.current_balance;
        let rate = ((total_value - self.initial_balance) / self.initial_balance)
            .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
            * dec!(100);
        self.return_rate = Some(rate);
        rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(status: SessionStatus) -> ChallengeSession {
        ChallengeSession {
            id: 1,
            challenge_id: 10,
            user_id: 100,
            initial_balance: dec!(1000000),
            current_balance: dec!(400000),
            return_rate: None,
            status,
            started_at: None,
            completed_at: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_end_requires_active() {
        let mut s = session(SessionStatus::Active);
        assert!(s.end(now()).is_ok());
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.completed_at, Some(now()));

        // 이미 종료된 세션은 다시 종료 불가
        assert!(s.end(now()).is_err());

        let mut ready = session(SessionStatus::Ready);
        assert!(ready.end(now()).is_err());
    }

    #[test]
    fn test_return_percentage() {
        let mut s = session(SessionStatus::Active);
        // 포트폴리오 720,000 + 현금 400,000 = 1,120,000 → +12%
        let rate = s.calculate_return_percentage(dec!(720000));
        assert_eq!(rate, dec!(12.00));
        assert_eq!(s.return_rate, Some(rate));

        // 손실 케이스: 500,000 + 400,000 = 900,000 → -10%
        let rate = s.calculate_return_percentage(dec!(500000));
        assert_eq!(rate, dec!(-10.00));
    }

    #[test]
    fn test_start_and_cancel_transitions() {
        let mut s = session(SessionStatus::Ready);
        assert!(s.start(now()).is_ok());
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.started_at, Some(now()));

        // 진행 중인 세션은 다시 시작 불가, 취소는 가능
        assert!(s.start(now()).is_err());
        assert!(s.cancel(now()).is_ok());
        assert_eq!(s.status, SessionStatus::Cancelled);

        // 이미 취소된 세션은 재취소 불가
        assert!(s.cancel(now()).is_err());
    }

    #[test]
    fn test_status_helpers() {
        assert!(SessionStatus::Active.is_active());
        assert!(!SessionStatus::Ready.is_active());
        assert!(SessionStatus::Completed.is_completed());
        assert!(SessionStatus::Cancelled.is_completed());
        assert!(SessionStatus::Ended.is_completed());
        assert!(!SessionStatus::Active.is_completed());
    }
}
