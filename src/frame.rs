//! OpenWebNet wire frame: parsing, serialization, and stream extraction
// (c) 2026 OpenNetty contributors
//!
//! # On-wire shape
//!
//! A frame is a `*`-delimited sequence of fields terminated by `##`. Each
//! field is a (possibly empty) run of decimal digits that may itself carry
//! an ordered list of `#`-separated parameters, e.g.
//!
//! ```text
//! *1*1*7806914##          -- normal frame, three fields
//! *#4*#1*20*0*0320*1##    -- extended frame, field 2 ("#1") carries no
//!                            parameters of its own but is itself a
//!                            parameterised field (leading `#`)
//! ```
//!
//! This module only deals with bytes and has no notion of WHO/WHAT/WHERE —
//! that interpretation lives in [`crate::protocol::message`].

use crate::error::FrameError;

/// Soft cap on a single frame's encoded length, protecting against stream
/// desync on a corrupted connection. 4 KiB is generously larger than any
/// legitimate OpenWebNet frame.
pub const MAX_FRAME_LEN: usize = 4096;

const START: u8 = b'*';
const FIELD_SEP: u8 = b'*';
const PARAM_SEP: u8 = b'#';
const TERMINATOR: &[u8] = b"##";

/// A single parameter attached to a [`Field`]. Equality is by textual content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter(String);

impl Parameter {
    /// Builds a parameter from its decimal text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The parameter's decimal text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for Parameter {
    fn from(value: S) -> Self {
        Self::new(value)
    }
}

/// A single field of a [`Frame`]: a (possibly empty) decimal value plus an
/// ordered list of parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Field {
    /// the field's own decimal text (may be empty, e.g. the leading `#1` field
    /// of an extended frame has value `""` and parameter `"1"`)
    pub value: String,
    /// ordered parameter list
    pub params: Vec<Parameter>,
}

impl Field {
    /// Builds a field with no parameters.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            params: Vec::new(),
        }
    }

    /// Builds a field carrying the given parameters.
    #[must_use]
    pub fn with_params(value: impl Into<String>, params: Vec<Parameter>) -> Self {
        Self {
            value: value.into(),
            params,
        }
    }

    /// Appends a parameter and returns `self`, for builder-style construction.
    #[must_use]
    pub fn param(mut self, p: impl Into<Parameter>) -> Self {
        self.params.push(p.into());
        self
    }
}

impl<S: Into<String>> From<S> for Field {
    fn from(value: S) -> Self {
        Self::new(value)
    }
}

/// A parsed OpenWebNet frame: an ordered list of fields.
///
/// # Invariant
///
/// For every `Frame` built through these constructors,
/// `Frame::parse(&f.serialize()) == Ok(f)`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Frame {
    fields: Vec<Field>,
}

impl Frame {
    /// Builds a frame from an ordered list of fields.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// The frame's fields, in wire order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The first field ("WHO" in OpenWebNet terms), if any.
    #[must_use]
    pub fn who(&self) -> Option<&Field> {
        self.fields.first()
    }

    /// Parses exactly one frame from a byte slice. The slice must contain
    /// precisely one frame (start sentinel, fields, terminator) and nothing
    /// else — use [`extract_frame`] to pull frames out of a longer buffer.
    pub fn parse(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() > MAX_FRAME_LEN {
            return Err(FrameError::TooLong(bytes.len(), MAX_FRAME_LEN));
        }
        if bytes.first() != Some(&START) {
            return Err(FrameError::MissingSentinel("expected leading '*'"));
        }
        if !bytes.ends_with(TERMINATOR) {
            return Err(FrameError::MissingSentinel("expected trailing '##'"));
        }
        let body = &bytes[1..bytes.len() - TERMINATOR.len()];
        if body.is_empty() {
            return Err(FrameError::UnbalancedSeparators);
        }

        let mut fields = Vec::new();
        let mut field_idx = 0usize;
        for raw_field in body.split(|&b| b == FIELD_SEP) {
            let mut parts = raw_field.split(|&b| b == PARAM_SEP);
            let value_bytes = parts.next().unwrap_or_default();
            let value = check_digits(value_bytes, field_idx)?;
            let mut params = Vec::new();
            for param_bytes in parts {
                let text = check_digits(param_bytes, field_idx)?;
                params.push(Parameter::new(text));
            }
            fields.push(Field::with_params(value, params));
            field_idx += 1;
        }
        Ok(Self { fields })
    }

    /// Serializes this frame to its canonical byte-string form.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        out.push(START);
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(FIELD_SEP);
            }
            out.extend_from_slice(field.value.as_bytes());
            for param in &field.params {
                out.push(PARAM_SEP);
                out.extend_from_slice(param.as_str().as_bytes());
            }
        }
        out.extend_from_slice(TERMINATOR);
        out
    }

    /// The well-known ACK frame (`*#*1##`).
    #[must_use]
    pub fn ack() -> Self {
        Self::new(vec![Field::new(""), Field::new("1")])
    }

    /// The well-known NACK frame (`*#*0##`).
    #[must_use]
    pub fn nack() -> Self {
        Self::new(vec![Field::new(""), Field::new("0")])
    }

    /// The well-known Busy frame (`*#*6##`).
    #[must_use]
    pub fn busy() -> Self {
        Self::new(vec![Field::new(""), Field::new("6")])
    }

    /// True if this frame is the well-known ACK.
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self == &Self::ack()
    }

    /// True if this frame is the well-known NACK.
    #[must_use]
    pub fn is_nack(&self) -> bool {
        self == &Self::nack()
    }

    /// True if this frame is the well-known Busy indication.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self == &Self::busy()
    }
}

fn check_digits(bytes: &[u8], field_idx: usize) -> Result<String, FrameError> {
    for &b in bytes {
        if !b.is_ascii_digit() {
            return Err(FrameError::NonDigitByte {
                field: field_idx,
                byte: b,
            });
        }
    }
    // SAFETY-free: we've just verified every byte is an ASCII digit.
    Ok(std::str::from_utf8(bytes)
        .expect("ascii digits are valid utf8")
        .to_owned())
}

/// Pulls the next complete span out of an append-only byte buffer.
///
/// Returns `None` if `buf` does not yet contain a complete frame (no `##`
/// terminator found past the next `*`); the caller should keep `buf` as-is
/// and append more bytes before trying again.
///
/// Returns `Some(Ok((frame, consumed)))` when that span parses cleanly, or
/// `Some(Err((error, consumed))` when it doesn't — `consumed` is the number
/// of bytes at the front of `buf` spanned by the attempt (including any
/// stray leading whitespace/NUL bytes skipped over) in both cases, so the
/// caller can always advance past it: a malformed span is resynced past,
/// never mistaken for "wait for more data".
///
/// Tolerates stray whitespace and NUL bytes between frames, matching
/// real-world OpenWebNet gateways that sometimes pad their output.
pub fn extract_frame(buf: &[u8]) -> Option<Result<(Frame, usize), (FrameError, usize)>> {
    let start = buf
        .iter()
        .position(|&b| b == START)
        .unwrap_or(buf.len());
    if start >= buf.len() {
        return None;
    }
    let rest = &buf[start..];
    let term_pos = find_subslice(rest, TERMINATOR)?;
    let end = term_pos + TERMINATOR.len();
    let frame_bytes = &rest[..end];
    let consumed = start + end;
    match Frame::parse(frame_bytes) {
        Ok(frame) => Some(Ok((frame, consumed))),
        Err(e) => Some(Err((e, consumed))),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_normal_frame() {
        let f = Frame::new(vec![Field::new("1"), Field::new("1"), Field::new("7806914")]);
        let bytes = f.serialize();
        assert_eq!(bytes, b"*1*1*7806914##");
        assert_eq!(Frame::parse(&bytes).unwrap(), f);
    }

    #[test]
    fn round_trip_extended_frame() {
        // *#4*#1*20*0*0320*1##
        let f = Frame::new(vec![
            Field::new("4"),
            Field::with_params("", vec!["1".into()]),
            Field::new("20"),
            Field::new("0"),
            Field::new("0320"),
            Field::new("1"),
        ]);
        let bytes = f.serialize();
        assert_eq!(bytes, b"*4*#1*20*0*0320*1##");
        assert_eq!(Frame::parse(&bytes).unwrap(), f);
    }

    #[test]
    fn scenario_round_trip_extended_frame_with_hash_who() {
        // Input `*#4*#1*20*0*0320*1##` from spec scenario 6: WHO=4 status-request
        // prefix folded into the first field via leading '#'.
        let bytes = b"*#4*#1*20*0*0320*1##";
        let parsed = Frame::parse(bytes).unwrap();
        assert_eq!(parsed.fields()[0].value, "");
        assert_eq!(parsed.fields()[0].params[0].as_str(), "4");
        assert_eq!(parsed.fields()[1].value, "");
        assert_eq!(parsed.fields()[1].params[0].as_str(), "1");
        assert_eq!(parsed.fields()[2].value, "20");
        assert_eq!(parsed.serialize(), bytes);
    }

    #[test]
    fn well_known_frames() {
        assert!(Frame::parse(b"*#*1##").unwrap().is_ack());
        assert!(Frame::parse(b"*#*0##").unwrap().is_nack());
        assert!(Frame::parse(b"*#*6##").unwrap().is_busy());
        assert_eq!(Frame::ack().serialize(), b"*#*1##");
        assert_eq!(Frame::nack().serialize(), b"*#*0##");
        assert_eq!(Frame::busy().serialize(), b"*#*6##");
    }

    #[test]
    fn missing_sentinels_are_rejected() {
        assert_eq!(
            Frame::parse(b"1*1*1##"),
            Err(FrameError::MissingSentinel("expected leading '*'"))
        );
        assert_eq!(
            Frame::parse(b"*1*1*1#"),
            Err(FrameError::MissingSentinel("expected trailing '##'"))
        );
    }

    #[test]
    fn non_digit_bytes_are_rejected() {
        let err = Frame::parse(b"*1*ab*1##").unwrap_err();
        assert_eq!(
            err,
            FrameError::NonDigitByte {
                field: 1,
                byte: b'a'
            }
        );
    }

    #[test]
    fn too_long_is_rejected() {
        let mut huge = vec![b'*'];
        huge.extend(std::iter::repeat(b'1').take(MAX_FRAME_LEN + 10));
        huge.extend_from_slice(b"##");
        assert!(matches!(
            Frame::parse(&huge),
            Err(FrameError::TooLong(_, MAX_FRAME_LEN))
        ));
    }

    #[test]
    fn extractor_finds_n_frames_with_inter_frame_noise() {
        let mut stream = Vec::new();
        let frames: Vec<Frame> = (1..=5)
            .map(|n| Frame::new(vec![Field::new("1"), Field::new("1"), Field::new(n.to_string())]))
            .collect();
        for f in &frames {
            stream.extend_from_slice(&f.serialize());
            stream.extend_from_slice(b"\0 \r\n");
        }

        let mut found = Vec::new();
        let mut cursor = &stream[..];
        while let Some(result) = extract_frame(cursor) {
            let (frame, consumed) = result.unwrap();
            found.push(frame);
            cursor = &cursor[consumed..];
        }
        assert_eq!(found, frames);
    }

    #[test]
    fn extractor_preserves_partial_suffix() {
        let complete = Frame::ack().serialize();
        let mut stream = complete.clone();
        stream.extend_from_slice(b"*1*1"); // partial next frame, no terminator yet

        let (frame, consumed) = extract_frame(&stream).unwrap().unwrap();
        assert!(frame.is_ack());
        assert_eq!(consumed, complete.len());
        let remainder = &stream[consumed..];
        assert_eq!(remainder, b"*1*1");
        assert!(extract_frame(remainder).is_none());
    }

    #[test]
    fn extractor_surfaces_malformed_span_and_advances_past_it() {
        let mut stream = b"*1*ab*1##".to_vec();
        stream.extend_from_slice(&Frame::ack().serialize());

        let (err, consumed) = extract_frame(&stream).unwrap().unwrap_err();
        assert_eq!(err, FrameError::NonDigitByte { field: 1, byte: b'a' });
        assert_eq!(consumed, b"*1*ab*1##".len());

        let remainder = &stream[consumed..];
        let (frame, _) = extract_frame(remainder).unwrap().unwrap();
        assert!(frame.is_ack());
    }
}
