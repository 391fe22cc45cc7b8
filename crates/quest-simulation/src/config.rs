//! 환경변수 기반 시뮬레이션 설정.

use std::time::Duration;

/// 시뮬레이션 엔진 설정.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// 틱 주기 (밀리초)
    pub tick_interval_ms: u64,
    /// 틱당 최대 처리 세션 수 (배치 한도)
    ///
    /// 틱 지연을 제한하기 위한 역압 밸브입니다. 한도를 넘은 세션은 다음
    /// 틱으로 미뤄지며, 시계가 파생 값이므로 정확성에는 영향이 없습니다.
    pub max_sessions_per_tick: usize,
    /// 세션 1건 처리 제한 시간 (초)
    ///
    /// 외부 협력자 호출(시세, 저장소)이 지연될 때 틱 전체가 무한정 멈추지
    /// 않도록 하는 방어선입니다. 배치 한도가 1차 완화책이고 이것은 2차입니다.
    pub session_timeout_secs: u64,
    /// 상태 정리(리퍼) 실행 주기 (초)
    pub reaper_interval_secs: u64,
    /// 상태 정리 기준 시간 (초) - 마지막 처리 후 이 시간이 지나면 제거
    pub stale_threshold_secs: u64,
    /// 통계 로깅 주기 (초)
    pub stats_interval_secs: u64,
    /// 시세 폴백 조회 시 과거 탐색 한도 (일)
    pub price_lookback_days: i64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10_000,
            max_sessions_per_tick: 50,
            session_timeout_secs: 30,
            reaper_interval_secs: 3_600,
            stale_threshold_secs: 7_200,
            stats_interval_secs: 300,
            price_lookback_days: 30,
        }
    }
}

impl SimulationConfig {
    /// 환경변수에서 설정 로드 (누락 시 기본값 사용).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            tick_interval_ms: env_var_parse("SIMULATION_TICK_INTERVAL_MS", 10_000),
            max_sessions_per_tick: env_var_parse("SIMULATION_MAX_SESSIONS_PER_TICK", 50),
            session_timeout_secs: env_var_parse("SIMULATION_SESSION_TIMEOUT_SECS", 30),
            reaper_interval_secs: env_var_parse("SIMULATION_REAPER_INTERVAL_SECS", 3_600),
            stale_threshold_secs: env_var_parse("SIMULATION_STALE_THRESHOLD_SECS", 7_200),
            stats_interval_secs: env_var_parse("SIMULATION_STATS_INTERVAL_SECS", 300),
            price_lookback_days: env_var_parse("VALUATION_LOOKBACK_DAYS", 30),
        }
    }

    /// 틱 주기를 Duration으로 반환.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// 세션 처리 제한 시간을 Duration으로 반환.
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// 리퍼 실행 주기를 Duration으로 반환.
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    /// 상태 정리 기준 시간을 chrono Duration으로 반환.
    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_threshold_secs as i64)
    }

    /// 통계 로깅 주기를 Duration으로 반환.
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
