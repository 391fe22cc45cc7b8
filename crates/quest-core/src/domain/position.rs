//! 포트폴리오 포지션 도메인 엔티티.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 세션의 단일 종목 보유 내역.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPosition {
    /// 소속 세션 ID
    pub session_id: i64,
    /// 챌린지 내 종목 식별키
    pub instrument_key: String,
    /// 보유 수량
    pub quantity: Decimal,
    /// 평균 매입가
    pub average_price: Decimal,
}

impl PortfolioPosition {
    /// 보유 수량이 있는지 여부.
    pub fn has_position(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// 지정 가격 기준 평가 금액.
    pub fn current_value(&self, price: Decimal) -> Decimal {
        self.quantity * price
    }

    /// 총 매입 원가.
    pub fn total_cost(&self) -> Decimal {
        self.quantity * self.average_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(quantity: Decimal) -> PortfolioPosition {
        PortfolioPosition {
            session_id: 1,
            instrument_key: "A".to_string(),
            quantity,
            average_price: dec!(150.00),
        }
    }

    #[test]
    fn test_has_position() {
        assert!(position(dec!(10)).has_position());
        assert!(!position(Decimal::ZERO).has_position());
    }

    #[test]
    fn test_current_value_and_cost() {
        let p = position(dec!(10));
        assert_eq!(p.current_value(dec!(160.00)), dec!(1600.00));
        assert_eq!(p.total_cost(), dec!(1500.00));
    }
}
