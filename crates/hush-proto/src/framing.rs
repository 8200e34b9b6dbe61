//! Newline framing.
//!
//! A transport message may carry several envelopes joined by
//! [`FRAME_DELIMITER`]. Receivers split and trim before decoding each one.

/// Separator between batched frames.
pub const FRAME_DELIMITER: char = '\n';

/// Split a transport message into its frames, trimming whitespace and
/// skipping empty pieces.
pub fn split_frames(message: &str) -> impl Iterator<Item = &str> {
    message
        .split(FRAME_DELIMITER)
        .map(str::trim)
        .filter(|frame| !frame.is_empty())
}

/// Join frames into one transport message.
pub fn join_frames<I, S>(frames: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, frame) in frames.into_iter().enumerate() {
        if i > 0 {
            out.push(FRAME_DELIMITER);
        }
        out.push_str(frame.as_ref());
    }
    out
}
