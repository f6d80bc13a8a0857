#![no_main]

use libfuzzer_sys::fuzz_target;
use tau_transcript::{finalize_turn, Turn, TurnReducer, TurnRole};
use tau_ui_stream::{extract_event, FrameDecoder};

fuzz_target!(|data: &[u8]| {
    // First byte picks the chunk size so frame boundaries land at varying offsets.
    let Some((&split, body)) = data.split_first() else {
        return;
    };
    let chunk_size = usize::from(split).max(1);

    let mut decoder = FrameDecoder::new();
    let mut frames = Vec::new();
    for chunk in body.chunks(chunk_size) {
        frames.extend(decoder.push(chunk));
    }
    frames.extend(decoder.finish());
    assert_eq!(decoder.buffered_len(), 0);

    let mut reducer = TurnReducer::new();
    let mut turn = Turn::new(TurnRole::Assistant);
    for frame in frames.into_iter().flatten() {
        assert!(!frame.is_empty());
        if let Some(event) = extract_event(&frame) {
            turn = reducer.apply(&turn, &event);
            assert!(turn.segments.iter().filter(|s| s.is_streaming()).count() <= 1);
        }
    }

    let finalized = finalize_turn(&turn);
    assert!(!finalized.has_streaming_segments());
    assert_eq!(finalize_turn(&finalized), finalized);
});
