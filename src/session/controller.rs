//! Examination session controller
//!
//! The state machine lives on its own task and is driven through a command
//! channel, so UI calls, background results and recording ticks are applied
//! one at a time. Dropping the [`ExaminationController`] unmounts the session:
//! the task cancels it and releases every device before exiting.

use super::machine::{Branch, ExaminationStateMachine, SessionDeps};
use super::state::{SessionEvent, SessionSnapshot, SessionState};
use crate::config::ExaminationConfig;
use crate::recorder::{Answer, AnswerSummary, RecordingEvent};
use crate::surface::RenderSurface;
use crate::utils::{SessionError, SessionResult};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use uuid::Uuid;

type Reply<T> = oneshot::Sender<SessionResult<T>>;

enum Command {
    Start(Reply<()>),
    AttachSurface(Arc<dyn RenderSurface>, Reply<()>),
    StartRecording(Reply<usize>),
    StopRecording(Reply<AnswerSummary>),
    NextQuestion(Reply<SessionState>),
    Cancel(oneshot::Sender<bool>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    TakeAnswers(Reply<Vec<Answer>>),
}

/// Handle to a running examination session
pub struct ExaminationController {
    session_id: Uuid,
    commands: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<SessionEvent>,
    state_rx: watch::Receiver<SessionState>,
}

impl ExaminationController {
    /// Create the session for `job_id`. Nothing happens until [`start`](Self::start).
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(job_id: impl Into<String>, config: ExaminationConfig, deps: SessionDeps) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (branch_tx, branch_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(128);
        let (state_tx, state_rx) = watch::channel(SessionState::NotStarted);

        let machine = ExaminationStateMachine::new(
            job_id.into(),
            config,
            deps,
            branch_tx,
            event_tx.clone(),
            state_tx,
        );
        let session_id = machine.session_id();
        tracing::info!("Examination session {} created", session_id);

        tokio::spawn(run(machine, command_rx, branch_rx, event_tx.clone()));

        Self {
            session_id,
            commands: command_tx,
            event_tx,
            state_rx,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Latest published state
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Wait until the state satisfies `predicate`.
    ///
    /// Returns the last known state if the session task is gone.
    pub async fn wait_for(&self, predicate: impl Fn(SessionState) -> bool) -> SessionState {
        let mut state_rx = self.state_rx.clone();
        loop {
            let state = *state_rx.borrow_and_update();
            if predicate(state) {
                return state;
            }
            if state_rx.changed().await.is_err() {
                return *state_rx.borrow();
            }
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> SessionResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn start(&self) -> SessionResult<()> {
        self.request(Command::Start).await
    }

    pub async fn attach_surface(&self, surface: Arc<dyn RenderSurface>) -> SessionResult<()> {
        self.request(|reply| Command::AttachSurface(surface, reply)).await
    }

    /// Returns the index of the question being answered
    pub async fn start_recording(&self) -> SessionResult<usize> {
        self.request(Command::StartRecording).await
    }

    pub async fn stop_recording(&self) -> SessionResult<AnswerSummary> {
        self.request(Command::StopRecording).await
    }

    pub async fn next_question(&self) -> SessionResult<SessionState> {
        self.request(Command::NextQuestion).await
    }

    pub async fn take_answers(&self) -> SessionResult<Vec<Answer>> {
        self.request(Command::TakeAnswers).await
    }

    /// Returns false if the session had already ended
    pub async fn cancel(&self) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(Command::Cancel(reply_tx)).await.is_err() {
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    pub async fn snapshot(&self) -> SessionResult<SessionSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot(reply_tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        reply_rx.await.map_err(|_| SessionError::Closed)
    }
}

async fn run(
    mut machine: ExaminationStateMachine,
    mut commands: mpsc::Receiver<Command>,
    mut branches: mpsc::UnboundedReceiver<Branch>,
    event_tx: broadcast::Sender<SessionEvent>,
) {
    let mut recording_events = machine.recording_events();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => dispatch(&mut machine, command),
                None => {
                    tracing::info!("Session {} unmounted", machine.session_id());
                    machine.cancel();
                    break;
                }
            },
            Some(branch) = branches.recv() => machine.handle_branch(branch),
            Ok(event) = recording_events.recv() => {
                if let RecordingEvent::Tick(seconds) = event {
                    let _ = event_tx.send(SessionEvent::RecordingTick { seconds });
                }
            }
        }
    }
}

fn dispatch(machine: &mut ExaminationStateMachine, command: Command) {
    match command {
        Command::Start(reply) => {
            let _ = reply.send(machine.start());
        }
        Command::AttachSurface(surface, reply) => {
            let _ = reply.send(machine.attach_surface(surface));
        }
        Command::StartRecording(reply) => {
            let _ = reply.send(machine.start_recording());
        }
        Command::StopRecording(reply) => {
            let _ = reply.send(machine.stop_recording());
        }
        Command::NextQuestion(reply) => {
            let _ = reply.send(machine.next_question());
        }
        Command::Cancel(reply) => {
            let _ = reply.send(machine.cancel());
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(machine.snapshot());
        }
        Command::TakeAnswers(reply) => {
            let _ = reply.send(machine.take_answers());
        }
    }
}
