//! API 라우트 모듈.

pub mod simulation;
