//! 시뮬레이션 엔진 데모 데몬 CLI.
//!
//! 외부 협력자 없이 인메모리 fixture 어댑터로 엔진을 구동합니다.
//! 운영 배포에서는 이 바이너리 대신 실제 저장소/시세 port 구현을 주입한
//! 애플리케이션이 엔진을 내장합니다.

mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use quest_core::SystemClock;
use quest_simulation::{
    InMemoryStateStore, PortfolioValuationService, SessionTerminator, SimulationConfig,
    SimulationEngine,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fixtures::{
    build_fixtures, FixturePriceResolver, InMemoryChallengeRepository, InMemoryPortfolioRepository,
    InMemorySessionRepository, LoggingLeaderboard,
};

#[derive(Parser)]
#[command(name = "quest-daemon")]
#[command(about = "StockQuest Simulation Engine Demo Daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 데몬 모드: 모든 세션이 완주할 때까지 주기 틱 실행
    Daemon {
        /// 생성할 데모 세션 수
        #[arg(long, default_value = "5")]
        sessions: usize,

        /// 시간 가속 배율 (8640 = 시뮬레이션 1일당 실제 10초)
        #[arg(long, default_value = "8640")]
        speed_factor: i32,

        /// 시뮬레이션 기간 (일)
        #[arg(long, default_value = "30")]
        period_days: i64,
    },

    /// 단일 틱 실행 후 상태 출력
    Tick {
        /// 생성할 데모 세션 수
        #[arg(long, default_value = "3")]
        sessions: usize,

        /// 시간 가속 배율
        #[arg(long, default_value = "30")]
        speed_factor: i32,

        /// 시뮬레이션 기간 (일)
        #[arg(long, default_value = "30")]
        period_days: i64,
    },
}

/// fixture 어댑터로 엔진 구성.
fn build_engine(
    config: SimulationConfig,
    sessions: usize,
    speed_factor: i32,
    period_days: i64,
) -> (Arc<SimulationEngine>, Arc<InMemorySessionRepository>) {
    let fixture_set = build_fixtures(sessions, speed_factor, period_days);

    let clock = Arc::new(SystemClock);
    let session_repo = Arc::new(InMemorySessionRepository::new(fixture_set.sessions));
    let challenge_repo = Arc::new(InMemoryChallengeRepository::new(fixture_set.challenges));
    let store = Arc::new(InMemoryStateStore::new());

    let valuation = Arc::new(PortfolioValuationService::new(
        Arc::new(InMemoryPortfolioRepository::new(fixture_set.positions)),
        Arc::new(FixturePriceResolver::new(fixture_set.period_start)),
        config.price_lookback_days,
    ));
    let terminator = Arc::new(SessionTerminator::new(
        session_repo.clone(),
        challenge_repo.clone(),
        Arc::new(LoggingLeaderboard),
        valuation,
        store.clone(),
        clock.clone(),
    ));
    let engine = Arc::new(SimulationEngine::new(
        config,
        clock,
        session_repo.clone(),
        challenge_repo,
        store,
        terminator,
    ));

    (engine, session_repo)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "quest_daemon={},quest_simulation={}",
                    cli.log_level, cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 설정 로드
    let config = SimulationConfig::from_env();

    match cli.command {
        Commands::Daemon {
            sessions,
            speed_factor,
            period_days,
        } => {
            tracing::info!(
                sessions = sessions,
                speed_factor = speed_factor,
                period_days = period_days,
                tick_interval_ms = config.tick_interval_ms,
                "=== 데모 데몬 시작 ==="
            );

            let (engine, session_repo) = build_engine(config, sessions, speed_factor, period_days);
            let handle = engine.start();

            // 모든 세션 완주 또는 Ctrl+C까지 대기
            let mut poll = tokio::time::interval(std::time::Duration::from_secs(2));
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = poll.tick() => {
                        if session_repo.active_count().await == 0 {
                            tracing::info!("모든 세션 완주, 데몬 종료");
                            break;
                        }
                    }
                }
            }

            handle.shutdown().await;

            // 최종 결과 출력
            println!("\n📊 세션 최종 결과:");
            println!("{:-<60}", "");
            for session in session_repo.snapshot().await {
                println!(
                    "  세션 {:<4} | 상태: {:<6} | 수익률: {}",
                    session.id,
                    session.status.description(),
                    session
                        .return_rate
                        .map(|r| format!("{}%", r))
                        .unwrap_or_else(|| "-".to_string())
                );
            }
            println!("{:-<60}", "");
        }
        Commands::Tick {
            sessions,
            speed_factor,
            period_days,
        } => {
            let (engine, _) = build_engine(config, sessions, speed_factor, period_days);

            let stats = engine.process_tick().await;
            stats.log_summary();

            println!("\n📋 시뮬레이션 상태:");
            for state in engine.all_states().await {
                println!("  {}", state.summary());
            }

            let statistics = engine.statistics().await;
            println!("\n{}", serde_json::to_string_pretty(&statistics)?);
        }
    }

    Ok(())
}
