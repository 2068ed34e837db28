//! AI Examination - proctored video interviews, one question at a time.
//!
//! This is the main library crate for the examination session controller.
//! It acquires the candidate's camera and microphone, shows the live picture,
//! walks through the interview questions and records one answer per question.

pub mod capture;
pub mod commands;
pub mod config;
pub mod exam;
pub mod recorder;
pub mod session;
pub mod surface;
pub mod utils;

#[cfg(test)]
mod testing;

pub use config::ExaminationConfig;
pub use session::{ExaminationController, SessionDeps, SessionEvent, SessionSnapshot, SessionState};
pub use utils::{ErrorResponse, SessionError};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging.
///
/// `RUST_LOG` takes precedence over the default filter. Does nothing if a
/// global subscriber is already installed.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_examination=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("AI Examination v{}", env!("CARGO_PKG_VERSION"));
    }
}
