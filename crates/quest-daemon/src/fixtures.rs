//! 데모/개발용 인메모리 어댑터.
//!
//! 외부 협력자(DB, 시세 저장소, 리더보드) 없이 엔진을 구동할 수 있도록
//! port 구현체를 제공합니다. 시세는 기준가에 일자 비례 드리프트를 더한
//! 결정적 합성 데이터입니다.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use quest_core::{
    Challenge, ChallengeInstrument, ChallengeRepository, ChallengeSession, ChallengeStatus,
    LeaderboardRecalculator, PortError, PortfolioPosition, PortfolioRepository, PriceResolver,
    SessionRepository, SessionStatus,
};

/// 인메모리 세션 저장소.
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<i64, ChallengeSession>>,
}

impl InMemorySessionRepository {
    pub fn new(sessions: Vec<ChallengeSession>) -> Self {
        Self {
            sessions: RwLock::new(sessions.into_iter().map(|s| (s.id, s)).collect()),
        }
    }

    /// 남은 활성 세션 수.
    pub async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.status.is_active())
            .count()
    }

    /// 전체 세션 스냅샷 (결과 출력용).
    pub async fn snapshot(&self) -> Vec<ChallengeSession> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_active_sessions(&self) -> Result<Vec<ChallengeSession>, PortError> {
        let mut active: Vec<ChallengeSession> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.status.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|s| s.id);
        Ok(active)
    }

    async fn save(&self, session: &ChallengeSession) -> Result<(), PortError> {
        self.sessions
            .write()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }
}

/// 인메모리 챌린지 저장소.
pub struct InMemoryChallengeRepository {
    challenges: HashMap<i64, Challenge>,
}

impl InMemoryChallengeRepository {
    pub fn new(challenges: Vec<Challenge>) -> Self {
        Self {
            challenges: challenges.into_iter().map(|c| (c.id, c)).collect(),
        }
    }
}

#[async_trait]
impl ChallengeRepository for InMemoryChallengeRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Challenge>, PortError> {
        Ok(self.challenges.get(&id).cloned())
    }
}

/// 결정적 합성 시세 제공자.
///
/// 기준가에 거래일수 × 0.2% 드리프트를 더해 종가를 만듭니다. 주말 개념이
/// 없는 단순 모델이지만 폴백 체인과 수익률 계산을 시연하기에 충분합니다.
pub struct FixturePriceResolver {
    /// 시세가 존재하는 첫 날짜
    epoch: NaiveDate,
}

impl FixturePriceResolver {
    pub fn new(epoch: NaiveDate) -> Self {
        Self { epoch }
    }

    fn base_price(instrument_key: &str) -> Decimal {
        match instrument_key {
            "A" => dec!(150.00),
            "B" => dec!(350.00),
            "C" => dec!(2800.00),
            "D" => dec!(200.00),
            "E" => dec!(3000.00),
            _ => dec!(100.00),
        }
    }

    fn price_at(&self, instrument_key: &str, date: NaiveDate) -> Option<Decimal> {
        let days = (date - self.epoch).num_days();
        if days < 0 {
            return None;
        }
        let base = Self::base_price(instrument_key);
        Some(base + base * dec!(0.002) * Decimal::from(days))
    }
}

#[async_trait]
impl PriceResolver for FixturePriceResolver {
    async fn get_close(
        &self,
        instrument_key: &str,
        date: NaiveDate,
    ) -> Result<Option<Decimal>, PortError> {
        Ok(self.price_at(instrument_key, date))
    }

    async fn get_latest(&self, instrument_key: &str) -> Result<Option<Decimal>, PortError> {
        Ok(self.price_at(instrument_key, Utc::now().date_naive()))
    }
}

/// 인메모리 포트폴리오 저장소.
pub struct InMemoryPortfolioRepository {
    positions: HashMap<i64, Vec<PortfolioPosition>>,
}

impl InMemoryPortfolioRepository {
    pub fn new(positions: HashMap<i64, Vec<PortfolioPosition>>) -> Self {
        Self { positions }
    }
}

#[async_trait]
impl PortfolioRepository for InMemoryPortfolioRepository {
    async fn find_positions(&self, session_id: i64) -> Result<Vec<PortfolioPosition>, PortError> {
        Ok(self.positions.get(&session_id).cloned().unwrap_or_default())
    }
}

/// 로깅만 하는 리더보드 재계산 stub.
pub struct LoggingLeaderboard;

#[async_trait]
impl LeaderboardRecalculator for LoggingLeaderboard {
    async fn recalculate(&self, challenge_id: i64) -> Result<(), PortError> {
        tracing::info!(challenge_id = challenge_id, "리더보드 재계산 (stub)");
        Ok(())
    }
}

/// 데모 시나리오 데이터.
pub struct FixtureSet {
    pub challenges: Vec<Challenge>,
    pub sessions: Vec<ChallengeSession>,
    pub positions: HashMap<i64, Vec<PortfolioPosition>>,
    pub period_start: NaiveDate,
}

/// 데모 시나리오 생성.
///
/// 챌린지 1개(2020-01-01부터 `period_days`일)와 세션 `session_count`개를
/// 만들고, 각 세션에 종목 A 10주 + B 2주 포지션을 부여합니다.
pub fn build_fixtures(session_count: usize, speed_factor: i32, period_days: i64) -> FixtureSet {
    let period_start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let period_end = period_start + chrono::Duration::days(period_days);

    let challenge = Challenge {
        id: 1,
        title: format!("{}일 시장 재생 데모", period_days),
        status: ChallengeStatus::Active,
        speed_factor,
        period_start,
        period_end,
        instruments: vec![
            ChallengeInstrument::new("A", "AAPL", "회사 A"),
            ChallengeInstrument::new("B", "MSFT", "회사 B"),
        ],
    };

    let mut sessions = Vec::new();
    let mut positions = HashMap::new();
    for i in 0..session_count {
        let session_id = (i + 1) as i64;
        sessions.push(ChallengeSession {
            id: session_id,
            challenge_id: challenge.id,
            user_id: 100 + session_id,
            initial_balance: dec!(10000),
            current_balance: dec!(7800),
            return_rate: None,
            status: SessionStatus::Active,
            started_at: Some(Utc::now()),
            completed_at: None,
        });
        positions.insert(
            session_id,
            vec![
                PortfolioPosition {
                    session_id,
                    instrument_key: "A".to_string(),
                    quantity: dec!(10),
                    average_price: dec!(150.00),
                },
                PortfolioPosition {
                    session_id,
                    instrument_key: "B".to_string(),
                    quantity: dec!(2),
                    average_price: dec!(350.00),
                },
            ],
        );
    }

    FixtureSet {
        challenges: vec![challenge],
        sessions,
        positions,
        period_start,
    }
}
