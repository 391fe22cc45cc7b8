//! 시뮬레이션 스케줄러 (틱 프로세서).
//!
//! 주기적으로 활성 세션을 순회하며 각 세션의 시뮬레이션 시계를 전진시키고,
//! 기간이 모두 경과한 세션을 자동 종료합니다.
//!
//! 세션별 상태 머신: `ACTIVE → (틱) → ACTIVE | TERMINATED`
//!
//! 한 세션의 처리 실패는 같은 틱의 다른 세션 처리를 중단시키지 않습니다
//! (실패 격리). 시뮬레이션 날짜가 파생 값이므로 실패한 세션은 다음 틱에
//! 자동으로 재시도됩니다.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use quest_core::{
    ChallengeRepository, ChallengeSession, Clock, PortError, SessionRepository, SimulationError,
};

use crate::config::SimulationConfig;
use crate::reaper::StateReaper;
use crate::state::SessionSimulationState;
use crate::stats::SimulationStatistics;
use crate::store::SimulationStateStore;
use crate::termination::{SessionTerminator, TerminationReason};

/// 엔진 처리 에러.
#[derive(Debug, Error)]
pub enum EngineError {
    /// 세션이 참조하는 챌린지가 존재하지 않음
    #[error("챌린지 없음: {0}")]
    ChallengeNotFound(i64),

    /// 외부 협력자 에러
    #[error(transparent)]
    Port(#[from] PortError),

    /// 시뮬레이션 설정 에러 (세션 시작 검증을 우회한 경우)
    #[error(transparent)]
    Config(#[from] SimulationError),
}

/// 틱 처리 통계.
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    /// 조회된 활성 세션 수
    pub active: usize,
    /// 이번 틱에서 처리된 세션 수 (진행 + 종료)
    pub processed: usize,
    /// 그 중 종료된 세션 수
    pub terminated: usize,
    /// 처리 실패 세션 수
    pub errors: usize,
    /// 배치 한도로 다음 틱으로 미뤄진 세션 수
    pub deferred: usize,
}

impl TickStats {
    /// 통계 요약 로그 출력.
    pub fn log_summary(&self) {
        tracing::info!(
            active = self.active,
            processed = self.processed,
            terminated = self.terminated,
            errors = self.errors,
            deferred = self.deferred,
            "시뮬레이션 틱 처리 완료"
        );
    }
}

/// 세션 단건 처리 결과.
enum SessionTickOutcome {
    /// 시뮬레이션 날짜 전진
    Advanced,
    /// 세션 종료됨
    Terminated(TerminationReason),
}

/// 시뮬레이션 엔진.
///
/// 틱 프로세서와 조회 연산을 제공하며, [`SimulationEngine::start`]로
/// 주기 태스크(틱/리퍼/통계)를 명시적으로 기동합니다.
pub struct SimulationEngine {
    config: SimulationConfig,
    clock: Arc<dyn Clock>,
    session_repository: Arc<dyn SessionRepository>,
    challenge_repository: Arc<dyn ChallengeRepository>,
    store: Arc<dyn SimulationStateStore>,
    terminator: Arc<SessionTerminator>,
    reaper: StateReaper,
}

impl SimulationEngine {
    /// 새 엔진 생성.
    pub fn new(
        config: SimulationConfig,
        clock: Arc<dyn Clock>,
        session_repository: Arc<dyn SessionRepository>,
        challenge_repository: Arc<dyn ChallengeRepository>,
        store: Arc<dyn SimulationStateStore>,
        terminator: Arc<SessionTerminator>,
    ) -> Self {
        let reaper = StateReaper::new(store.clone(), clock.clone(), config.stale_threshold());
        Self {
            config,
            clock,
            session_repository,
            challenge_repository,
            store,
            terminator,
            reaper,
        }
    }

    /// 메인 시뮬레이션 틱 1회 처리.
    ///
    /// 활성 세션을 조회해 배치 한도까지 순서대로 처리합니다. 한도를 넘은
    /// 세션은 다음 틱으로 미뤄지며, 시계가 파생 값이므로 밀린 만큼의
    /// 시뮬레이션 시간도 다음 틱에서 한 번에 따라잡습니다.
    pub async fn process_tick(&self) -> TickStats {
        debug!("시뮬레이션 틱 처리 시작");
        let mut stats = TickStats::default();

        let active_sessions = match self.session_repository.find_active_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = %e, "활성 세션 조회 실패, 이번 틱 건너뜀");
                stats.errors += 1;
                return stats;
            }
        };

        if active_sessions.is_empty() {
            debug!("활성 세션 없음, 시뮬레이션 스킵");
            return stats;
        }

        stats.active = active_sessions.len();
        info!(count = active_sessions.len(), "시뮬레이션 처리 대상 세션");

        for (index, session) in active_sessions.iter().enumerate() {
            if stats.processed >= self.config.max_sessions_per_tick {
                stats.deferred = active_sessions.len() - index;
                info!(
                    processed = stats.processed,
                    deferred = stats.deferred,
                    "배치 처리 한도 도달, 다음 틱에서 계속"
                );
                break;
            }

            // 외부 호출 지연으로 틱 전체가 멈추지 않도록 세션별 제한 시간 적용
            let outcome = tokio::time::timeout(
                self.config.session_timeout(),
                self.process_session(session),
            )
            .await;

            match outcome {
                Ok(Ok(SessionTickOutcome::Advanced)) => {
                    stats.processed += 1;
                }
                Ok(Ok(SessionTickOutcome::Terminated(_))) => {
                    stats.processed += 1;
                    stats.terminated += 1;
                }
                Ok(Err(e)) => {
                    // 실패 격리: 다음 세션 처리를 계속한다
                    error!(
                        session_id = session.id,
                        error = %e,
                        "세션 시뮬레이션 처리 실패"
                    );
                    stats.errors += 1;
                }
                Err(_) => {
                    error!(
                        session_id = session.id,
                        timeout_secs = self.config.session_timeout_secs,
                        "세션 처리 제한 시간 초과, 다음 틱에서 재시도"
                    );
                    stats.errors += 1;
                }
            }
        }

        debug!(processed = stats.processed, "시뮬레이션 틱 처리 완료");
        stats
    }

    /// 개별 세션의 시뮬레이션 진행 처리.
    async fn process_session(
        &self,
        session: &ChallengeSession,
    ) -> Result<SessionTickOutcome, EngineError> {
        let challenge = self
            .challenge_repository
            .find_by_id(session.challenge_id)
            .await?
            .ok_or(EngineError::ChallengeNotFound(session.challenge_id))?;

        // 소속 챌린지가 더 이상 진행 중이 아니면 세션도 종료
        if !challenge.status.is_active() {
            warn!(
                session_id = session.id,
                challenge_id = challenge.id,
                "비활성 챌린지의 세션 발견, 세션 종료"
            );
            self.terminator
                .terminate(session, TerminationReason::ChallengeDeactivated)
                .await?;
            return Ok(SessionTickOutcome::Terminated(
                TerminationReason::ChallengeDeactivated,
            ));
        }

        let now = self.clock.now();

        // 첫 관측 시 상태 지연 생성
        let mut state = match self.store.get(session.id).await {
            Some(state) => state,
            None => {
                let state = SessionSimulationState::initialize(session, &challenge, now)?;
                info!(
                    session_id = session.id,
                    period_start = %challenge.period_start,
                    speed_factor = challenge.speed_factor,
                    "시뮬레이션 상태 초기화"
                );
                state
            }
        };

        // 현재 시뮬레이션 날짜는 매 틱 처음부터 다시 유도 (누적 없음)
        let current_simulation_date = state.simulated_date_at(now);
        state.current_simulation_date = current_simulation_date;
        state.last_processed_at = now;

        // 시뮬레이션 완료 여부 확인
        if current_simulation_date >= challenge.period_end {
            // 종료 워크플로우가 확정 날짜로 쓰도록 클램프된 날짜를 먼저 반영
            self.store.put(state).await;
            info!(
                session_id = session.id,
                final_date = %current_simulation_date,
                "시뮬레이션 완료, 세션 종료"
            );
            self.terminator
                .terminate(session, TerminationReason::SimulationCompleted)
                .await?;
            return Ok(SessionTickOutcome::Terminated(
                TerminationReason::SimulationCompleted,
            ));
        }

        self.log_progress_if_needed(&mut state);

        debug!(
            session_id = session.id,
            date = %current_simulation_date,
            progress = state.progress_pct(),
            "세션 시뮬레이션 진행"
        );

        self.store.put(state).await;
        Ok(SessionTickOutcome::Advanced)
    }

    /// 진행률 로깅 (10% 단위 경계에서만).
    fn log_progress_if_needed(&self, state: &mut SessionSimulationState) {
        let current_progress = state.progress_pct();
        if current_progress >= state.last_logged_progress + 10 {
            info!(
                session_id = state.session_id,
                progress = current_progress,
                date = %state.current_simulation_date,
                "시뮬레이션 진행"
            );
            // 10의 배수로 정규화
            state.last_logged_progress = (current_progress / 10) * 10;
        }
    }

    /// 특정 세션의 현재 시뮬레이션 상태 조회.
    pub async fn state_of(&self, session_id: i64) -> Option<SessionSimulationState> {
        self.store.get(session_id).await
    }

    /// 모든 활성 시뮬레이션 상태 조회 (관리용).
    pub async fn all_states(&self) -> Vec<SessionSimulationState> {
        self.store.snapshot_all().await
    }

    /// 집계 통계 조회.
    pub async fn statistics(&self) -> SimulationStatistics {
        let states = self.store.snapshot_all().await;
        SimulationStatistics::from_states(&states)
    }

    /// 현재 시각 (상태 스냅샷의 ETA 계산용).
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// 주기 태스크 기동.
    ///
    /// 틱 프로세서, 리퍼, 통계 로거를 독립 태스크로 띄우고 수명주기 핸들을
    /// 반환합니다. 각 태스크는 단일 루프에서 순차 실행되므로 같은 스케줄러의
    /// 틱이 겹쳐 실행되는 일(single-flight 위반)은 구조적으로 불가능합니다.
    pub fn start(self: &Arc<Self>) -> EngineHandle {
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let mut tasks = Vec::new();

        // 틱 프로세서
        {
            let engine = Arc::clone(self);
            let mut shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(engine.config.tick_interval());
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("[Tick] 종료 신호 수신");
                            break;
                        }
                        _ = interval.tick() => {
                            let stats = engine.process_tick().await;
                            if stats.processed > 0 || stats.errors > 0 {
                                stats.log_summary();
                            }
                        }
                    }
                }
            }));
        }

        // 상태 리퍼 (저빈도)
        {
            let engine = Arc::clone(self);
            let mut shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(engine.config.reaper_interval());
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval.tick().await; // 첫 tick 즉시 반환 (소비)

                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("[Reaper] 종료 신호 수신");
                            break;
                        }
                        _ = interval.tick() => {
                            engine.reaper.sweep().await;
                        }
                    }
                }
            }));
        }

        // 통계 로거 (저빈도)
        {
            let engine = Arc::clone(self);
            let mut shutdown_rx = shutdown_tx.subscribe();
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(engine.config.stats_interval());
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval.tick().await; // 첫 tick 즉시 반환 (소비)

                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("[Stats] 종료 신호 수신");
                            break;
                        }
                        _ = interval.tick() => {
                            if engine.store.active_count().await > 0 {
                                engine.statistics().await.log_summary();
                            }
                        }
                    }
                }
            }));
        }

        info!(
            tick_interval_ms = self.config.tick_interval_ms,
            max_sessions_per_tick = self.config.max_sessions_per_tick,
            "시뮬레이션 엔진 시작"
        );

        EngineHandle { shutdown_tx, tasks }
    }
}

/// 엔진 수명주기 핸들.
///
/// drop해도 태스크는 중단되지 않습니다. 정상 종료는 [`EngineHandle::shutdown`]을
/// 호출하세요.
pub struct EngineHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// 종료 신호를 보내고 모든 주기 태스크가 끝날 때까지 대기.
    pub async fn shutdown(self) {
        info!("시뮬레이션 엔진 종료 중...");
        let _ = self.shutdown_tx.send(());
        for task in self.tasks {
            let _ = task.await;
        }
        info!("시뮬레이션 엔진 종료 완료");
    }
}
