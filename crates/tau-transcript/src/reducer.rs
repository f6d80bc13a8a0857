use std::collections::HashMap;

use tau_ui_stream::UiStreamEvent;

use crate::{Segment, StreamLifecycle, ToolLifecycle, Turn};

/// Folds UI stream events into the in-flight assistant turn.
///
/// `apply` never mutates its input: it returns a structurally copied turn, so a reader
/// holding the previous value keeps a stable snapshot. The reducer only carries per-turn
/// scratch state: a `toolCallId -> segment index` cache and the raw partial tool input
/// accumulated from `tool-input-delta` events, which is not valid JSON until
/// `tool-input-available` arrives and is therefore never written into the segment.
///
/// # Examples
///
/// ```
/// use tau_transcript::{finalize_turn, Segment, Turn, TurnReducer, TurnRole};
/// use tau_ui_stream::UiStreamEvent;
///
/// let mut reducer = TurnReducer::new();
/// let mut turn = Turn::new(TurnRole::Assistant);
/// for delta in ["Hel", "lo"] {
///     turn = reducer.apply(&turn, &UiStreamEvent::TextDelta { delta: delta.to_string() });
/// }
/// let turn = finalize_turn(&turn);
/// assert_eq!(turn.segments, vec![Segment::text("Hello")]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TurnReducer {
    tool_indices: HashMap<String, usize>,
    tool_inputs: HashMap<String, String>,
}

impl TurnReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next turn state after `event`.
    pub fn apply(&mut self, turn: &Turn, event: &UiStreamEvent) -> Turn {
        let mut next = turn.clone();
        self.apply_in_place(&mut next, event);
        next
    }

    /// Raw tool input received so far for a call whose input is still streaming.
    pub fn partial_tool_input(&self, tool_call_id: &str) -> Option<&str> {
        self.tool_inputs.get(tool_call_id).map(String::as_str)
    }

    fn apply_in_place(&mut self, turn: &mut Turn, event: &UiStreamEvent) {
        tracing::trace!(
            turn_id = %turn.id,
            event_type = event.event_type(),
            "applying ui stream event"
        );

        match event {
            UiStreamEvent::Start
            | UiStreamEvent::StartStep
            | UiStreamEvent::FinishStep
            | UiStreamEvent::Finish
            | UiStreamEvent::Unknown => {}
            UiStreamEvent::TextDelta { delta } => append_text_delta(turn, delta),
            UiStreamEvent::ReasoningStart => {
                close_open_segments(&mut turn.segments);
                turn.segments.push(Segment::streaming_reasoning());
            }
            UiStreamEvent::ReasoningDelta { delta } => append_reasoning_delta(turn, delta),
            UiStreamEvent::ReasoningEnd => {
                for segment in &mut turn.segments {
                    if let Segment::Reasoning { lifecycle, .. } = segment {
                        *lifecycle = StreamLifecycle::Complete;
                    }
                }
            }
            UiStreamEvent::ToolInputStart {
                tool_call_id,
                tool_name,
            } => self.start_tool(turn, tool_call_id, tool_name),
            UiStreamEvent::ToolInputDelta {
                tool_call_id,
                delta,
            } => {
                if delta.is_empty() {
                    return;
                }
                let Some(index) = self.tool_index(turn, tool_call_id) else {
                    log_unknown_tool_call(turn, event, tool_call_id);
                    return;
                };
                if matches!(
                    turn.segments[index],
                    Segment::Tool { lifecycle, .. } if lifecycle < ToolLifecycle::InputReady
                ) {
                    self.tool_inputs
                        .entry(tool_call_id.clone())
                        .or_default()
                        .push_str(delta);
                }
                update_tool(
                    &mut turn.segments[index],
                    None,
                    ToolLifecycle::InputStreaming,
                    |_, _| {},
                );
            }
            UiStreamEvent::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                let Some(index) = self.tool_index(turn, tool_call_id) else {
                    log_unknown_tool_call(turn, event, tool_call_id);
                    return;
                };
                self.tool_inputs.remove(tool_call_id);
                update_tool(
                    &mut turn.segments[index],
                    tool_name.as_deref(),
                    ToolLifecycle::InputReady,
                    |input_slot, _| *input_slot = Some(input.clone()),
                );
            }
            UiStreamEvent::ToolOutputAvailable {
                tool_call_id,
                tool_name,
                output,
            } => {
                let Some(index) = self.tool_index(turn, tool_call_id) else {
                    log_unknown_tool_call(turn, event, tool_call_id);
                    return;
                };
                update_tool(
                    &mut turn.segments[index],
                    tool_name.as_deref(),
                    ToolLifecycle::OutputReady,
                    |_, output_slot| *output_slot = Some(output.clone()),
                );
            }
        }
    }

    fn start_tool(&mut self, turn: &mut Turn, tool_call_id: &str, tool_name: &str) {
        // A repeated start for a known call updates that segment in place.
        if let Some(index) = self.tool_index(turn, tool_call_id) {
            let name = Some(tool_name).filter(|name| !name.is_empty());
            update_tool(
                &mut turn.segments[index],
                name,
                ToolLifecycle::InputStarting,
                |_, _| {},
            );
            return;
        }

        close_open_segments(&mut turn.segments);
        turn.segments.push(Segment::tool(tool_call_id, tool_name));
        self.tool_inputs
            .insert(tool_call_id.to_string(), String::new());
        self.tool_indices
            .insert(tool_call_id.to_string(), turn.segments.len() - 1);
    }

    /// Locates the tool segment for `tool_call_id`, trusting the cached index only when it
    /// still points at the matching segment.
    fn tool_index(&mut self, turn: &Turn, tool_call_id: &str) -> Option<usize> {
        if let Some(&index) = self.tool_indices.get(tool_call_id) {
            if turn
                .segments
                .get(index)
                .and_then(Segment::tool_call_id)
                == Some(tool_call_id)
            {
                return Some(index);
            }
        }

        let index = turn
            .segments
            .iter()
            .position(|segment| segment.tool_call_id() == Some(tool_call_id))?;
        self.tool_indices.insert(tool_call_id.to_string(), index);
        Some(index)
    }
}

/// Stateless single-event reduction; equivalent to a fresh [`TurnReducer`].
pub fn reduce_turn(turn: &Turn, event: &UiStreamEvent) -> Turn {
    TurnReducer::new().apply(turn, event)
}

/// Forces every streaming text or reasoning segment to complete.
///
/// Tool segments keep their last lifecycle. Finalizing a finalized turn is a no-op.
pub fn finalize_turn(turn: &Turn) -> Turn {
    let mut next = turn.clone();
    next.segments.iter_mut().for_each(Segment::complete);
    next
}

fn append_text_delta(turn: &mut Turn, delta: &str) {
    if delta.is_empty() {
        return;
    }
    if let Some(Segment::Text {
        text,
        lifecycle: StreamLifecycle::Streaming,
    }) = turn.segments.last_mut()
    {
        text.push_str(delta);
        return;
    }

    close_open_segments(&mut turn.segments);
    turn.segments.push(Segment::streaming_text(delta));
}

fn append_reasoning_delta(turn: &mut Turn, delta: &str) {
    if delta.is_empty() {
        return;
    }
    let open = turn.segments.iter_mut().rev().find_map(|segment| match segment {
        Segment::Reasoning {
            text,
            lifecycle: StreamLifecycle::Streaming,
        } => Some(text),
        _ => None,
    });
    match open {
        Some(text) => text.push_str(delta),
        None => tracing::debug!(
            turn_id = %turn.id,
            "dropping reasoning delta without an open reasoning segment"
        ),
    }
}

fn close_open_segments(segments: &mut [Segment]) {
    segments
        .iter_mut()
        .filter(|segment| segment.is_streaming())
        .for_each(Segment::complete);
}

fn update_tool<F>(segment: &mut Segment, name: Option<&str>, target: ToolLifecycle, fill: F)
where
    F: FnOnce(&mut Option<serde_json::Value>, &mut Option<serde_json::Value>),
{
    let Segment::Tool {
        tool_name,
        input,
        output,
        lifecycle,
        ..
    } = segment
    else {
        return;
    };

    if let Some(name) = name.filter(|name| !name.is_empty()) {
        *tool_name = name.to_string();
    }
    fill(input, output);
    *lifecycle = (*lifecycle).max(target);
}

fn log_unknown_tool_call(turn: &Turn, event: &UiStreamEvent, tool_call_id: &str) {
    tracing::debug!(
        turn_id = %turn.id,
        event_type = event.event_type(),
        tool_call_id,
        "dropping tool event for unknown tool call"
    );
}
