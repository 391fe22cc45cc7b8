//! Speed Factor 기반 시뮬레이션 시계.
//!
//! 실제 경과 시간과 배속으로부터 현재 시뮬레이션 날짜를 계산하는 순수 함수와,
//! 테스트에서 벽시계 대기 없이 시간을 제어할 수 있는 `Clock` 추상화를 제공합니다.
//!
//! 시뮬레이션 날짜는 매번 `(시작 시점, 현재 시점, 배속)`에서 처음부터 다시
//! 유도됩니다. 누적 방식이 아니므로 틱을 건너뛰어도 드리프트가 생기지 않고,
//! 재시작 후에도 동일한 입력이면 동일한 결과가 나옵니다.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::SimulationError;

/// 1일을 밀리초로 환산한 값
const MILLIS_PER_DAY: i64 = 86_400_000;

/// 현재 시뮬레이션 날짜 계산.
///
/// 로직:
/// - speedFactor = 1: 실시간 (실제 1일 = 시뮬레이션 1일)
/// - speedFactor = 10: 10배속 (실제 2.4시간 = 시뮬레이션 1일)
/// - speedFactor = 100: 100배속 (실제 14.4분 = 시뮬레이션 1일)
///
/// 결과는 항상 `[period_start, period_end]` 범위로 클램프됩니다.
/// `now < started_at`인 경우 경과 시간을 0으로 취급합니다.
pub fn compute_simulated_date(
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    speed_factor: i32,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> NaiveDate {
    let elapsed_real_ms = (now - started_at).num_milliseconds().max(0);
    let simulated_ms = elapsed_real_ms.saturating_mul(speed_factor.max(0) as i64);
    let simulated_days = simulated_ms / MILLIS_PER_DAY;

    let calculated = period_start
        .checked_add_signed(Duration::days(simulated_days))
        .unwrap_or(period_end);

    if calculated > period_end {
        period_end
    } else {
        calculated
    }
}

/// 시뮬레이션 설정 검증.
///
/// 세션 시작 시점에 호출되어 잘못된 설정이 틱 루프에 도달하지 않도록 하는
/// 관문입니다. 엔진은 상태를 지연 생성할 때 방어적으로 한 번 더 검증합니다.
pub fn validate_simulation_period(
    speed_factor: i32,
    period_start: NaiveDate,
    period_end: NaiveDate,
) -> Result<(), SimulationError> {
    if speed_factor < 1 {
        return Err(SimulationError::InvalidSpeedFactor(speed_factor));
    }
    if period_end <= period_start {
        return Err(SimulationError::InvalidPeriod {
            start: period_start,
            end: period_end,
        });
    }
    Ok(())
}

/// 현재 시각 제공자 trait.
///
/// 스케줄러와 종료 워크플로우는 `Utc::now()`를 직접 호출하지 않고 이 trait를
/// 통해 시각을 얻습니다. 테스트에서는 [`ManualClock`]을 주입하여 벽시계
/// 대기 없이 시간 경과를 재현할 수 있습니다.
pub trait Clock: Send + Sync {
    /// 현재 시각 (UTC).
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 벽시계.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동 제어 시계 (테스트/데모용).
///
/// `set`/`advance`로 시각을 임의로 이동할 수 있습니다.
pub struct ManualClock {
    now: std::sync::RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// 지정한 시각에서 시작하는 수동 시계 생성.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::RwLock::new(start),
        }
    }

    /// 현재 시각을 지정 값으로 설정.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }

    /// 현재 시각을 지정한 만큼 전진.
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.write().unwrap();
        *guard += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}
