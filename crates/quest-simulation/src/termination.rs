//! 세션 종료 워크플로우.
//!
//! 완료되었거나 중단된 세션을 최종 확정합니다: 최종 평가 → 수익률 계산 →
//! 상태 전환 저장 → 리더보드 재계산(best-effort) → 상태 제거.
//!
//! 상태 전환 저장까지의 실패는 호출자(틱 루프)로 전파되어 다음 틱에
//! 재시도됩니다. 리더보드 재계산 실패는 로깅 후 무시되며, 이미 커밋된
//! 상태 전환을 되돌리지 않습니다.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use quest_core::{
    Challenge, ChallengeRepository, ChallengeSession, Clock, LeaderboardRecalculator, PortError,
    SessionRepository,
};

use crate::store::SimulationStateStore;
use crate::valuation::PortfolioValuationService;

/// 세션 종료 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// 시뮬레이션 기간이 모두 경과함
    SimulationCompleted,
    /// 소속 챌린지가 비활성화됨
    ChallengeDeactivated,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimulationCompleted => write!(f, "시뮬레이션 완료"),
            Self::ChallengeDeactivated => write!(f, "챌린지 비활성화"),
        }
    }
}

/// Best-effort 부수효과 실행 결과.
///
/// 실패가 본 흐름을 차단하지 않는다는 계약을 타입으로 드러냅니다.
/// 재시도는 없습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffectOutcome {
    /// 정상 수행됨
    Completed,
    /// 실패 (로깅됨, 전파 안 함)
    Failed,
}

/// 종료 처리 결과 요약.
#[derive(Debug, Clone)]
pub struct TerminationOutcome {
    /// 최종 확정에 사용한 시뮬레이션 날짜
    pub final_date: NaiveDate,
    /// 최종 포트폴리오 평가금액
    pub final_portfolio_value: Decimal,
    /// 최종 수익률 (%)
    pub final_return_rate: Decimal,
    /// 리더보드 재계산 결과
    pub leaderboard: SideEffectOutcome,
}

/// 세션 종료 워크플로우.
pub struct SessionTerminator {
    session_repository: Arc<dyn SessionRepository>,
    challenge_repository: Arc<dyn ChallengeRepository>,
    leaderboard: Arc<dyn LeaderboardRecalculator>,
    valuation: Arc<PortfolioValuationService>,
    store: Arc<dyn SimulationStateStore>,
    clock: Arc<dyn Clock>,
}

impl SessionTerminator {
    /// 새 종료 워크플로우 생성.
    pub fn new(
        session_repository: Arc<dyn SessionRepository>,
        challenge_repository: Arc<dyn ChallengeRepository>,
        leaderboard: Arc<dyn LeaderboardRecalculator>,
        valuation: Arc<PortfolioValuationService>,
        store: Arc<dyn SimulationStateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session_repository,
            challenge_repository,
            leaderboard,
            valuation,
            store,
            clock,
        }
    }

    /// 세션 종료 처리.
    ///
    /// 자연 완료당 최대 1회 실행은 4.3의 ACTIVE 전용 세션 조회가 보장합니다.
    /// 상태 전환이 저장되면 세션은 더 이상 ACTIVE 집합에 나타나지 않습니다.
    pub async fn terminate(
        &self,
        session: &ChallengeSession,
        reason: TerminationReason,
    ) -> Result<TerminationOutcome, PortError> {
        info!(
            session_id = session.id,
            reason = %reason,
            "세션 자동 종료 시작"
        );

        // 1. 최종 확정 날짜 결정: 추적 중인 시뮬레이션 날짜, 없으면 챌린지 종료일
        let challenge = self.find_challenge(session.challenge_id).await?;
        let final_date = match self.store.get(session.id).await {
            Some(state) => state.current_simulation_date,
            None => challenge.period_end,
        };

        // 2. 최종 포트폴리오 평가
        let final_portfolio_value = self
            .valuation
            .calculate_portfolio_value(session.id, &challenge, final_date)
            .await?;

        // 3. 최종 수익률 계산 + 4. 상태 전환 저장
        let mut session = session.clone();
        let final_return_rate = session.calculate_return_percentage(final_portfolio_value);
        session
            .end(self.clock.now())
            .map_err(|e| PortError::Other(e.to_string()))?;
        self.session_repository.save(&session).await?;

        // 5. 리더보드 재계산 (best-effort, 상태 전환을 되돌리지 않음)
        let leaderboard = self.trigger_leaderboard_update(session.challenge_id).await;

        // 6. 시뮬레이션 상태 정리
        self.store.remove(session.id).await;

        info!(
            session_id = session.id,
            final_date = %final_date,
            final_value = %final_portfolio_value,
            return_rate = %final_return_rate,
            "세션 자동 종료 완료"
        );

        Ok(TerminationOutcome {
            final_date,
            final_portfolio_value,
            final_return_rate,
            leaderboard,
        })
    }

    async fn find_challenge(&self, challenge_id: i64) -> Result<Challenge, PortError> {
        self.challenge_repository
            .find_by_id(challenge_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("챌린지 없음: {}", challenge_id)))
    }

    /// 리더보드 재계산 트리거 (fire-and-forget, 결과만 로깅).
    async fn trigger_leaderboard_update(&self, challenge_id: i64) -> SideEffectOutcome {
        match self.leaderboard.recalculate(challenge_id).await {
            Ok(()) => {
                info!(challenge_id = challenge_id, "세션 종료 후 랭킹 업데이트 완료");
                SideEffectOutcome::Completed
            }
            Err(e) => {
                warn!(
                    challenge_id = challenge_id,
                    error = %e,
                    "랭킹 업데이트 실패 (세션 종료는 성공)"
                );
                SideEffectOutcome::Failed
            }
        }
    }
}
