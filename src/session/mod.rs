//! Examination sessions
//!
//! - ExaminationStateMachine owns every transition and all cleanup
//! - ExaminationController runs it on a task and is the public entry point
//! - Snapshots and events are what the UI renders from

pub mod controller;
pub mod machine;
pub mod state;


pub use controller::ExaminationController;
pub use machine::{ExaminationStateMachine, SessionDeps};
pub use state::{SessionEvent, SessionSnapshot, SessionState};
