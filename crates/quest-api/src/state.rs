//! API 공유 상태.

use std::sync::Arc;

use quest_simulation::SimulationEngine;

/// 핸들러 간 공유되는 애플리케이션 상태.
pub struct AppState {
    /// 시뮬레이션 엔진
    pub engine: Arc<SimulationEngine>,
}

impl AppState {
    /// 새 상태 생성.
    pub fn new(engine: Arc<SimulationEngine>) -> Self {
        Self { engine }
    }
}
