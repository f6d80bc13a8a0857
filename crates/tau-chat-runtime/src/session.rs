use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tau_transcript::{
    finalize_turn, has_submittable_content, transcript_from_history, ChatStreamRequest,
    ContentPart, PersistedMessage, Transcript, Turn, TurnReducer, TurnRole,
};
use tau_ui_stream::{decode_events, UiStreamEvent};
use tokio::sync::watch;

use crate::{
    ChatRecordService, ChatRuntimeConfig, ChatRuntimeError, ChatTransport,
    CooperativeCancellationToken, HttpChatTransport,
};

const EMPTY_SUBMISSION_MESSAGE: &str = "Please enter a message or upload an image";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ChatStatus` values.
pub enum ChatStatus {
    #[default]
    Idle,
    Submitted,
    Streaming,
    Ready,
    Error,
}

impl ChatStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitted => "submitted",
            Self::Streaming => "streaming",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// True while a turn is waiting for or reading its response.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Submitted | Self::Streaming)
    }
}

/// Immutable view published after every state change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatSnapshot {
    pub transcript: Arc<Transcript>,
    pub status: ChatStatus,
    pub error: Option<String>,
}

impl ChatSnapshot {
    pub fn last_turn(&self) -> Option<&Turn> {
        self.transcript.last()
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Enumerates supported `ChatSessionEvent` values.
pub enum ChatSessionEvent {
    StatusChanged { status: ChatStatus },
    TurnStarted { user_turn_id: String },
    TurnFinished { turn: Turn },
    TurnFailed { message: String },
    TurnCancelled { turn_id: Option<String> },
}

pub type ChatSessionEventHandler = Arc<dyn Fn(&ChatSessionEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
/// Enumerates supported `TurnOutcome` values.
pub enum TurnOutcome {
    /// The stream ended normally; `turn` is the finalized assistant turn.
    Finished { turn: Turn },
    /// The turn was cancelled or superseded before its stream ended.
    Cancelled { turn_id: Option<String> },
}

struct ActiveTurn {
    generation: u64,
    token: CooperativeCancellationToken,
    assistant: Option<Arc<Turn>>,
    reducer: TurnReducer,
}

#[derive(Default)]
struct SessionState {
    transcript: Arc<Transcript>,
    status: ChatStatus,
    error: Option<String>,
    active: Option<ActiveTurn>,
    generation: u64,
}

impl SessionState {
    fn is_current(&self, generation: u64) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| active.generation == generation)
    }

    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            transcript: Arc::clone(&self.transcript),
            status: self.status,
            error: self.error.clone(),
        }
    }

    /// Writes `turn` back into the transcript if it is still present.
    ///
    /// Only the slot is swapped; other turns stay shared with earlier snapshots.
    fn store_turn(&mut self, turn: Arc<Turn>) -> bool {
        if self.transcript.turn(&turn.id).is_none() {
            return false;
        }
        Arc::make_mut(&mut self.transcript).replace_turn(turn)
    }

    /// Cancels the in-flight turn, keeping its partial assistant turn with open segments closed.
    fn cancel_active(&mut self) -> Option<ChatSessionEvent> {
        let active = self.active.take()?;
        active.token.cancel();

        let turn_id = active.assistant.map(|assistant| {
            let finalized = Arc::new(finalize_turn(&assistant));
            self.store_turn(Arc::clone(&finalized));
            finalized.id.clone()
        });
        tracing::info!(
            generation = active.generation,
            turn_id = turn_id.as_deref().unwrap_or(""),
            "chat turn cancelled"
        );
        Some(ChatSessionEvent::TurnCancelled { turn_id })
    }
}

struct ChatSessionInner {
    transport: Arc<dyn ChatTransport>,
    state: Mutex<SessionState>,
    snapshots: watch::Sender<Arc<ChatSnapshot>>,
    handlers: Mutex<Vec<ChatSessionEventHandler>>,
}

/// Owns a transcript and drives at most one streaming turn at a time.
///
/// Cloning is cheap and every clone drives the same session. Readers either poll
/// [`snapshot`](Self::snapshot) or follow [`watch`](Self::watch); each published snapshot is
/// immutable, so a reader never observes a half-applied event.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<ChatSessionInner>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ChatSession")
            .field("turns", &snapshot.transcript.len())
            .field("status", &snapshot.status)
            .finish()
    }
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self::with_transcript(transport, Transcript::new())
    }

    pub fn with_transcript(transport: Arc<dyn ChatTransport>, transcript: Transcript) -> Self {
        let state = SessionState {
            transcript: Arc::new(transcript),
            ..SessionState::default()
        };
        let (snapshots, _) = watch::channel(Arc::new(state.snapshot()));
        Self {
            inner: Arc::new(ChatSessionInner {
                transport,
                state: Mutex::new(state),
                snapshots,
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Builds a session talking to the configured HTTP endpoint.
    pub fn from_config(config: &ChatRuntimeConfig) -> Result<Self, ChatRuntimeError> {
        let transport = HttpChatTransport::new(config)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Registers a synchronous event handler. A panicking handler does not affect the session.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&ChatSessionEvent) + Send + Sync + 'static,
    {
        lock_or_recover(&self.inner.handlers).push(Arc::new(handler));
    }

    pub fn watch(&self) -> watch::Receiver<Arc<ChatSnapshot>> {
        self.inner.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> Arc<ChatSnapshot> {
        self.inner.snapshots.borrow().clone()
    }

    pub fn transcript(&self) -> Arc<Transcript> {
        Arc::clone(&self.snapshot().transcript)
    }

    pub fn status(&self) -> ChatStatus {
        self.snapshot().status
    }

    pub fn error(&self) -> Option<String> {
        self.snapshot().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.status().is_loading()
    }

    /// Raw, not yet parseable tool input streamed so far for a call of the in-flight turn.
    pub fn partial_tool_input(&self, tool_call_id: &str) -> Option<String> {
        let state = lock_or_recover(&self.inner.state);
        state
            .active
            .as_ref()?
            .reducer
            .partial_tool_input(tool_call_id)
            .map(str::to_string)
    }

    /// Submits a turn and streams the assistant's reply into the transcript.
    ///
    /// Any turn still in flight is cancelled first. Resolves when the reply stream ends, the
    /// turn fails, or the turn is cancelled by [`cancel`](Self::cancel) or a newer submission.
    pub async fn start_turn(
        &self,
        role: TurnRole,
        parts: Vec<ContentPart>,
    ) -> Result<TurnOutcome, ChatRuntimeError> {
        if !has_submittable_content(&parts) {
            let error = ChatRuntimeError::Validation(EMPTY_SUBMISSION_MESSAGE.to_string());
            let events = {
                let mut state = lock_or_recover(&self.inner.state);
                state.error = Some(error.to_string());
                // A turn already in flight keeps its status.
                let idle = state.active.is_none();
                if idle {
                    state.status = ChatStatus::Error;
                }
                self.publish(&state);
                if idle {
                    vec![ChatSessionEvent::StatusChanged {
                        status: ChatStatus::Error,
                    }]
                } else {
                    Vec::new()
                }
            };
            self.emit(events);
            return Err(error);
        }

        let user_turn = Turn::from_content_parts(role, parts);
        let user_turn_id = user_turn.id.clone();
        let (generation, token, request, events) = {
            let mut state = lock_or_recover(&self.inner.state);
            let mut events = Vec::with_capacity(3);
            events.extend(state.cancel_active());

            state.generation += 1;
            let generation = state.generation;
            let token = CooperativeCancellationToken::new();
            state.active = Some(ActiveTurn {
                generation,
                token: token.clone(),
                assistant: None,
                reducer: TurnReducer::new(),
            });
            Arc::make_mut(&mut state.transcript).push_turn(user_turn);
            state.status = ChatStatus::Submitted;
            state.error = None;
            let request = ChatStreamRequest::from_transcript(&state.transcript);
            self.publish(&state);

            events.push(ChatSessionEvent::StatusChanged {
                status: ChatStatus::Submitted,
            });
            events.push(ChatSessionEvent::TurnStarted {
                user_turn_id: user_turn_id.clone(),
            });
            (generation, token, request, events)
        };
        self.emit(events);
        tracing::info!(
            generation,
            turn_id = %user_turn_id,
            messages = request.messages.len(),
            "chat turn started"
        );

        let mut assistant_turn_id = None;
        let result = self
            .drive_turn(generation, &token, &request, &mut assistant_turn_id)
            .await;
        self.settle_turn(generation, assistant_turn_id, result)
    }

    /// Aborts the in-flight turn without starting another. Returns false when idle.
    pub fn cancel(&self) -> bool {
        let events = {
            let mut state = lock_or_recover(&self.inner.state);
            let Some(cancelled) = state.cancel_active() else {
                return false;
            };
            state.status = ChatStatus::Ready;
            self.publish(&state);
            vec![
                cancelled,
                ChatSessionEvent::StatusChanged {
                    status: ChatStatus::Ready,
                },
            ]
        };
        self.emit(events);
        true
    }

    /// Empties the transcript and forgets the last error.
    ///
    /// An in-flight turn keeps reading, but its events no longer land in the transcript and it
    /// settles as cancelled.
    pub fn clear_transcript(&self) {
        let mut state = lock_or_recover(&self.inner.state);
        state.transcript = Arc::new(Transcript::new());
        state.error = None;
        self.publish(&state);
    }

    /// Replaces the transcript with previously persisted messages.
    pub fn load_history(&self, messages: Vec<PersistedMessage>) {
        let transcript = transcript_from_history(messages);
        tracing::debug!(turns = transcript.len(), "loaded chat history");
        let mut state = lock_or_recover(&self.inner.state);
        state.transcript = Arc::new(transcript);
        self.publish(&state);
    }

    /// Loads the stored messages of `chat_id` and returns how many turns were restored.
    pub async fn resume_chat(
        &self,
        records: &dyn ChatRecordService,
        chat_id: &str,
    ) -> Result<usize, ChatRuntimeError> {
        let messages = records.get_messages(chat_id).await?;
        let count = messages.len();
        self.load_history(messages);
        Ok(count)
    }

    async fn drive_turn(
        &self,
        generation: u64,
        token: &CooperativeCancellationToken,
        request: &ChatStreamRequest,
        assistant_turn_id: &mut Option<String>,
    ) -> Result<(), ChatRuntimeError> {
        let body = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ChatRuntimeError::Cancelled),
            body = self.inner.transport.open_stream(request) => body?,
        };

        {
            let mut state = lock_or_recover(&self.inner.state);
            let assistant = Arc::new(Turn::new(TurnRole::Assistant));
            let Some(active) = state
                .active
                .as_mut()
                .filter(|active| active.generation == generation)
            else {
                return Err(ChatRuntimeError::Cancelled);
            };
            *assistant_turn_id = Some(assistant.id.clone());
            active.assistant = Some(Arc::clone(&assistant));
            Arc::make_mut(&mut state.transcript).push_turn(assistant);
            state.status = ChatStatus::Streaming;
            self.publish(&state);
        }
        self.emit(vec![ChatSessionEvent::StatusChanged {
            status: ChatStatus::Streaming,
        }]);

        let mut events = Box::pin(decode_events(body));
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ChatRuntimeError::Cancelled),
                next = events.next() => next,
            };
            let Some(event) = next else {
                return Ok(());
            };
            if !self.apply_event(generation, &event?) {
                return Err(ChatRuntimeError::Cancelled);
            }
        }
    }

    /// Folds one event into the active assistant turn. Returns false once the turn is stale.
    fn apply_event(&self, generation: u64, event: &UiStreamEvent) -> bool {
        let mut state = lock_or_recover(&self.inner.state);
        let Some(active) = state
            .active
            .as_mut()
            .filter(|active| active.generation == generation)
        else {
            return false;
        };
        let Some(assistant) = active.assistant.as_ref() else {
            return false;
        };

        let next = Arc::new(active.reducer.apply(assistant, event));
        active.assistant = Some(Arc::clone(&next));
        if state.store_turn(Arc::clone(&next)) {
            self.publish(&state);
        } else {
            tracing::trace!(turn_id = %next.id, "assistant turn no longer in transcript");
        }
        true
    }

    fn settle_turn(
        &self,
        generation: u64,
        assistant_turn_id: Option<String>,
        result: Result<(), ChatRuntimeError>,
    ) -> Result<TurnOutcome, ChatRuntimeError> {
        let (outcome, events) = {
            let mut state = lock_or_recover(&self.inner.state);
            if !state.is_current(generation) {
                // Superseded: whoever cancelled this turn already finalized it.
                return Ok(TurnOutcome::Cancelled {
                    turn_id: assistant_turn_id,
                });
            }
            let Some(active) = state.active.take() else {
                return Ok(TurnOutcome::Cancelled {
                    turn_id: assistant_turn_id,
                });
            };
            let finalized = active
                .assistant
                .as_deref()
                .map(|assistant| Arc::new(finalize_turn(assistant)));
            let stored = finalized
                .as_ref()
                .is_some_and(|turn| state.store_turn(Arc::clone(turn)));
            let segments = finalized.as_ref().map_or(0, |turn| turn.segments.len());
            let cleared = result.is_ok() && !stored;

            let (status, outcome, event) = match (result, finalized) {
                (Ok(()), Some(turn)) if stored => {
                    tracing::info!(turn_id = %turn.id, segments, "chat turn finished");
                    let turn = Turn::clone(&turn);
                    (
                        ChatStatus::Ready,
                        Ok(TurnOutcome::Finished { turn: turn.clone() }),
                        ChatSessionEvent::TurnFinished { turn },
                    )
                }
                (Err(ChatRuntimeError::Cancelled), finalized) | (Ok(()), finalized) => {
                    let turn_id = finalized.map(|turn| turn.id.clone());
                    if cleared {
                        tracing::info!(
                            generation,
                            turn_id = turn_id.as_deref().unwrap_or(""),
                            "chat turn cleared before it finished"
                        );
                    }
                    (
                        ChatStatus::Ready,
                        Ok(TurnOutcome::Cancelled {
                            turn_id: turn_id.clone(),
                        }),
                        ChatSessionEvent::TurnCancelled { turn_id },
                    )
                }
                (Err(error), _) => {
                    let message = error.to_string();
                    tracing::warn!(
                        generation,
                        segments,
                        error = %message,
                        "chat turn failed"
                    );
                    state.error = Some(message.clone());
                    (
                        ChatStatus::Error,
                        Err(error),
                        ChatSessionEvent::TurnFailed { message },
                    )
                }
            };
            state.status = status;
            self.publish(&state);
            (outcome, vec![event, ChatSessionEvent::StatusChanged { status }])
        };
        self.emit(events);
        outcome
    }

    fn publish(&self, state: &SessionState) {
        self.inner.snapshots.send_replace(Arc::new(state.snapshot()));
    }

    fn emit(&self, events: Vec<ChatSessionEvent>) {
        if events.is_empty() {
            return;
        }
        let handlers = lock_or_recover(&self.inner.handlers).clone();
        for event in &events {
            for handler in &handlers {
                let _ = catch_unwind(AssertUnwindSafe(|| handler(event)));
            }
        }
    }
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
