//! 외부 협력자 port trait.
//!
//! 세션/챌린지/포트폴리오 영속성, 과거 시세 조회, 리더보드 재계산은 모두
//! 이 코어 바깥의 협력자가 담당합니다. 각 협력자별로 이 trait를 구현하여
//! 저장소 중립적인 시뮬레이션 코드를 작성할 수 있습니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use super::{Challenge, ChallengeSession, PortfolioPosition};

/// Port 에러.
#[derive(Debug, Error)]
pub enum PortError {
    /// 엔티티 없음
    #[error("엔티티 없음: {0}")]
    NotFound(String),

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Storage(String),

    /// 시장 데이터 에러
    #[error("시장 데이터 에러: {0}")]
    MarketData(String),

    /// 기타 에러
    #[error("기타 에러: {0}")]
    Other(String),
}

/// 챌린지 세션 저장소 port.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// 현재 ACTIVE 상태인 세션 전체 조회.
    ///
    /// 스케줄러가 매 틱 호출합니다. ACTIVE가 아닌 세션은 절대 반환하지
    /// 않아야 종료 로직의 최대 1회 실행이 보장됩니다.
    async fn find_active_sessions(&self) -> Result<Vec<ChallengeSession>, PortError>;

    /// 세션 저장 (상태 전환, 수익률 반영).
    async fn save(&self, session: &ChallengeSession) -> Result<(), PortError>;
}

/// 챌린지 저장소 port.
#[async_trait]
pub trait ChallengeRepository: Send + Sync {
    /// ID로 챌린지 조회.
    async fn find_by_id(&self, id: i64) -> Result<Option<Challenge>, PortError>;
}

/// 과거 시세 조회 port.
///
/// "가격 없음"은 에러가 아니라 `Ok(None)`입니다. 평가 엔진은 이를 폴백
/// 체인의 다음 단계로 진행하라는 신호로 해석합니다.
#[async_trait]
pub trait PriceResolver: Send + Sync {
    /// 특정 날짜의 종가 조회.
    ///
    /// # Errors
    ///
    /// - `PortError::MarketData`: 시세 저장소 접근 실패
    async fn get_close(
        &self,
        instrument_key: &str,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, PortError>;

    /// 최신 가격 조회 (날짜 무관).
    ///
    /// # Errors
    ///
    /// - `PortError::MarketData`: 시세 저장소 접근 실패
    async fn get_latest(&self, instrument_key: &str) -> Result<Option<Decimal>, PortError>;
}

/// 포트폴리오 저장소 port.
#[async_trait]
pub trait PortfolioRepository: Send + Sync {
    /// 세션의 모든 포지션 조회.
    async fn find_positions(&self, session_id: i64) -> Result<Vec<PortfolioPosition>, PortError>;
}

/// 리더보드 재계산 port.
///
/// 이 코어 관점에서는 fire-and-forget입니다. 실패는 로깅 후 무시되며
/// 세션 종료를 되돌리거나 차단하지 않습니다.
#[async_trait]
pub trait LeaderboardRecalculator: Send + Sync {
    /// 챌린지 리더보드 재계산 트리거.
    async fn recalculate(&self, challenge_id: i64) -> Result<(), PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// 테스트용 MockResolver.
    struct MockResolver {
        should_fail: bool,
    }

    #[async_trait]
    impl PriceResolver for MockResolver {
        async fn get_close(
            &self,
            instrument_key: &str,
            _date: NaiveDate,
        ) -> Result<Option<Decimal>, PortError> {
            if self.should_fail {
                return Err(PortError::MarketData("Mock storage error".to_string()));
            }
            // "A"만 시세 존재
            Ok((instrument_key == "A").then(|| dec!(150.00)))
        }

        async fn get_latest(&self, _instrument_key: &str) -> Result<Option<Decimal>, PortError> {
            if self.should_fail {
                return Err(PortError::MarketData("Mock storage error".to_string()));
            }
            Ok(Some(dec!(160.00)))
        }
    }

    #[tokio::test]
    async fn test_mock_resolver_not_found_is_ok_none() {
        let resolver = MockResolver { should_fail: false };

        // 가격 없음은 에러가 아니라 Ok(None)
        let date = NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        assert_eq!(resolver.get_close("A", date).await.unwrap(), Some(dec!(150.00)));
        assert_eq!(resolver.get_close("Z", date).await.unwrap(), None);
        assert_eq!(resolver.get_latest("A").await.unwrap(), Some(dec!(160.00)));
    }

    #[tokio::test]
    async fn test_mock_resolver_errors() {
        let resolver = MockResolver { should_fail: true };

        let date = NaiveDate::from_ymd_opt(2020, 1, 15).unwrap();
        let result = resolver.get_close("A", date).await;
        assert!(matches!(result.unwrap_err(), PortError::MarketData(_)));
    }
}
