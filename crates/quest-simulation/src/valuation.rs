//! 시뮬레이션 포트폴리오 평가.
//!
//! 특정 시뮬레이션 날짜 기준으로 포트폴리오 평가금액을 계산합니다.
//! 시세 조회는 폴백 체인으로 보호되어 평가 자체는 절대 실패하지 않습니다:
//!
//! 1. 해당 날짜의 종가
//! 2. 과거 탐색 한도(기본 30일) 내 가장 가까운 종가
//! 3. 최신 가격 (날짜 무관)
//! 4. 종목별 기본 가격 상수
//!
//! 각 폴백 단계는 로그로 관측 가능해야 조용한 품질 저하를 진단할 수 있습니다.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use quest_core::{Challenge, PortError, PortfolioRepository, PriceResolver};

/// 모든 조회가 실패했을 때 사용하는 종목별 기본 가격.
fn default_price_for_instrument(instrument_key: &str) -> Decimal {
    match instrument_key.to_uppercase().as_str() {
        "AAPL" | "A" => dec!(150.00),
        "MSFT" | "B" => dec!(350.00),
        "GOOGL" | "C" => dec!(2800.00),
        "TSLA" | "D" => dec!(200.00),
        "AMZN" | "E" => dec!(3000.00),
        "META" | "F" => dec!(300.00),
        "NVDA" | "G" => dec!(800.00),
        "NFLX" | "H" => dec!(400.00),
        _ => dec!(100.00),
    }
}

/// 포트폴리오 평가 서비스.
pub struct PortfolioValuationService {
    portfolio_repository: Arc<dyn PortfolioRepository>,
    price_resolver: Arc<dyn PriceResolver>,
    /// 폴백 시 과거로 탐색할 최대 일수
    lookback_days: i64,
}

impl PortfolioValuationService {
    /// 새 평가 서비스 생성.
    pub fn new(
        portfolio_repository: Arc<dyn PortfolioRepository>,
        price_resolver: Arc<dyn PriceResolver>,
        lookback_days: i64,
    ) -> Self {
        Self {
            portfolio_repository,
            price_resolver,
            lookback_days,
        }
    }

    /// 특정 시뮬레이션 날짜 기준 포트폴리오 총 평가금액 계산.
    ///
    /// 수량이 0인 포지션은 시세 조회 없이 건너뜁니다. 챌린지 종목 목록에
    /// 없는 포지션은 평균단가로 평가합니다.
    pub async fn calculate_portfolio_value(
        &self,
        session_id: i64,
        challenge: &Challenge,
        simulation_date: NaiveDate,
    ) -> Result<Decimal, PortError> {
        debug!(
            session_id = session_id,
            date = %simulation_date,
            "포트폴리오 평가 시작"
        );

        let positions = self.portfolio_repository.find_positions(session_id).await?;

        // 보유 수량이 없는 포지션은 시세 조회 없이 제외
        let held: Vec<_> = positions.iter().filter(|p| p.has_position()).collect();

        if held.is_empty() {
            debug!(session_id = session_id, "포트폴리오 포지션 없음");
            return Ok(Decimal::ZERO);
        }

        let market_prices = self
            .resolve_prices_for(challenge, &held, simulation_date)
            .await;

        let mut total_value = Decimal::ZERO;
        for position in &held {
            let market_price = match market_prices.get(&position.instrument_key) {
                Some(price) => *price,
                None => {
                    warn!(
                        session_id = session_id,
                        instrument_key = %position.instrument_key,
                        "챌린지 종목 목록에 없는 포지션, 평균단가 사용"
                    );
                    position.average_price
                }
            };

            let position_value = position.current_value(market_price);
            total_value += position_value;

            debug!(
                instrument_key = %position.instrument_key,
                quantity = %position.quantity,
                price = %market_price,
                value = %position_value,
                "포지션 평가"
            );
        }

        debug!(
            session_id = session_id,
            date = %simulation_date,
            value = %total_value,
            "포트폴리오 총 평가금액"
        );

        Ok(total_value)
    }

    /// 실제 보유 중인 챌린지 종목들의 시장가 조회.
    ///
    /// 챌린지 종목 목록에 있으면서 보유 수량이 있는 종목만 조회합니다.
    async fn resolve_prices_for(
        &self,
        challenge: &Challenge,
        held: &[&quest_core::PortfolioPosition],
        date: NaiveDate,
    ) -> HashMap<String, Decimal> {
        let mut prices = HashMap::new();

        for position in held {
            let key = &position.instrument_key;
            if prices.contains_key(key) || challenge.find_instrument(key).is_none() {
                continue;
            }
            let price = self.resolve_price(key, date).await;
            prices.insert(key.clone(), price);
        }

        prices
    }

    /// 단일 종목 가격 결정 (폴백 체인).
    async fn resolve_price(&self, instrument_key: &str, date: NaiveDate) -> Decimal {
        // 1. 해당 날짜의 종가
        match self.price_resolver.get_close(instrument_key, date).await {
            Ok(Some(price)) => {
                debug!(instrument_key = %instrument_key, date = %date, price = %price,
                    "과거 시장가 조회 성공");
                return price;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(instrument_key = %instrument_key, date = %date, error = %e,
                    "종가 조회 실패, 폴백 진행");
            }
        }

        // 2. 탐색 한도 내 가장 가까운 과거 종가
        if let Some((found_date, price)) = self.lookback_close(instrument_key, date).await {
            debug!(instrument_key = %instrument_key, requested = %date, found = %found_date,
                price = %price, "과거 시장가 대체값 사용");
            return price;
        }

        // 3. 최신 가격 (날짜 무관)
        match self.price_resolver.get_latest(instrument_key).await {
            Ok(Some(price)) => {
                warn!(instrument_key = %instrument_key, date = %date, price = %price,
                    "과거 시세 없음, 최신 가격으로 대체");
                return price;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(instrument_key = %instrument_key, error = %e, "최신 가격 조회 실패");
            }
        }

        // 4. 최후의 수단: 기본 가격
        let default_price = default_price_for_instrument(instrument_key);
        warn!(instrument_key = %instrument_key, date = %date, price = %default_price,
            "모든 시세 조회 실패, 기본 가격 사용");
        default_price
    }

    /// 기준일 이전 가장 가까운 종가를 하루씩 거슬러 탐색.
    async fn lookback_close(
        &self,
        instrument_key: &str,
        target_date: NaiveDate,
    ) -> Option<(NaiveDate, Decimal)> {
        for days_back in 1..=self.lookback_days {
            let candidate = target_date - Duration::days(days_back);
            match self.price_resolver.get_close(instrument_key, candidate).await {
                Ok(Some(price)) => return Some((candidate, price)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(instrument_key = %instrument_key, date = %candidate, error = %e,
                        "대체 시장가 조회 실패");
                    continue;
                }
            }
        }
        None
    }
}
