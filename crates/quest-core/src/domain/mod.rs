//! 도메인 엔티티 및 port trait.

pub mod challenge;
pub mod ports;
pub mod position;
pub mod session;

pub use challenge::{Challenge, ChallengeInstrument, ChallengeStatus};
pub use ports::{
    ChallengeRepository, LeaderboardRecalculator, PortError, PortfolioRepository, PriceResolver,
    SessionRepository,
};
pub use position::PortfolioPosition;
pub use session::{ChallengeSession, SessionStatus};
