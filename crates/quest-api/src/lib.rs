//! 시뮬레이션 모니터링/관리 API.
//!
//! 시뮬레이션 엔진의 운영 상태를 조회하는 관리용 엔드포인트를 제공합니다.
//! 트레이딩 API의 일부가 아니며, 서버 기동/인증/미들웨어는 이 crate를
//! 내장하는 애플리케이션이 담당합니다.

pub mod routes;
pub mod state;

pub use routes::simulation::simulation_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use quest_simulation::SimulationEngine;

/// 시뮬레이션 관리 라우터 생성.
pub fn router(engine: Arc<SimulationEngine>) -> Router {
    let state = Arc::new(AppState::new(engine));
    Router::new()
        .merge(simulation_routes())
        .with_state(state)
}
