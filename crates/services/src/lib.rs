#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod gateway;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use error::{AppServicesError, GatewayError, SessionError};
pub use gateway::{GatewayConfig, HttpSessionGateway, SessionGateway};

pub use sessions::{
    AnswerOutcome, CompletionCoordinator, RecoveryService, ResumableSession, SessionLoopService,
    SessionPhase, SessionProgress, TestSession,
};
