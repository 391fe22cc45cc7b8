//! 챌린지 도메인 엔티티.
//!
//! 특정 기간의 과거 시장 데이터를 배속 재생하는 투자 학습 챌린지입니다.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::validate_simulation_period;
use crate::error::SimulationError;

/// 챌린지 상태.
///
/// 시뮬레이션 엔진은 ACTIVE 상태의 챌린지에 속한 세션만 진행시킵니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeStatus {
    /// 작성 중
    Draft,
    /// 시작 예약됨
    Scheduled,
    /// 진행 중 (세션 참여 가능)
    Active,
    /// 종료됨
    Completed,
    /// 취소됨
    Cancelled,
    /// 보관됨
    Archived,
}

impl ChallengeStatus {
    /// 진행 중 여부.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// 챌린지 종목.
///
/// 참가자에게는 실제 티커를 숨기고 챌린지 내 식별키(A, B, C...)만 노출합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeInstrument {
    /// 챌린지 내 식별키 (A, B, C, ...)
    pub instrument_key: String,
    /// 실제 티커 (AAPL, GOOGL, ...)
    pub actual_ticker: String,
    /// 숨겨진 표시명 (회사 A, 회사 B, ...)
    pub hidden_name: String,
}

impl ChallengeInstrument {
    /// 새 챌린지 종목 생성.
    pub fn new(
        instrument_key: impl Into<String>,
        actual_ticker: impl Into<String>,
        hidden_name: impl Into<String>,
    ) -> Self {
        Self {
            instrument_key: instrument_key.into(),
            actual_ticker: actual_ticker.into(),
            hidden_name: hidden_name.into(),
        }
    }
}

/// 챌린지 엔티티.
///
/// 시뮬레이션 코어가 사용하는 필드만 포함합니다. 카테고리, 템플릿, 참가 조건
/// 등의 관리 속성은 영속성 협력자 소유입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// 챌린지 ID
    pub id: i64,
    /// 제목 (로깅/관리 화면용)
    pub title: String,
    /// 상태
    pub status: ChallengeStatus,
    /// 시간 압축 배율 (1 = 실시간, N = 실제 1일당 시뮬레이션 N일)
    pub speed_factor: i32,
    /// 시뮬레이션할 시장 데이터 시작일
    pub period_start: NaiveDate,
    /// 시뮬레이션할 시장 데이터 종료일
    pub period_end: NaiveDate,
    /// 거래 가능 종목 목록
    pub instruments: Vec<ChallengeInstrument>,
}

impl Challenge {
    /// 시뮬레이션 설정 검증.
    ///
    /// 세션 시작 시점의 관문으로, 잘못된 배속/기간이 틱 루프에 도달하지
    /// 않도록 합니다.
    pub fn validate_simulation_config(&self) -> Result<(), SimulationError> {
        validate_simulation_period(self.speed_factor, self.period_start, self.period_end)
    }

    /// 시뮬레이션 전체 기간 (일수).
    pub fn total_period_days(&self) -> i64 {
        (self.period_end - self.period_start).num_days()
    }

    /// 식별키로 종목 조회.
    pub fn find_instrument(&self, instrument_key: &str) -> Option<&ChallengeInstrument> {
        self.instruments
            .iter()
            .find(|i| i.instrument_key == instrument_key)
    }
}
