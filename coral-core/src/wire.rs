//! Length-prefixed binary framing.
//!
//! Request: `u32 totalLen | u32 argCount | argCount x (u32 argLen | bytes)`.
//! Response: `u32 totalLen | tagged payload` (see [`crate::command`] for the tags).
//! All integers are little-endian. Ceiling violations and trailing bytes are protocol errors,
//! which are fatal to the offending connection.

use coral_common::error::{CoralError, CoralResult};

use crate::command::CommandReply;

/// Bytes occupied by the `u32 totalLen` prefix.
pub const LEN_PREFIX_BYTES: usize = 4;

/// Examines buffered input for one complete frame.
///
/// Returns `Ok(None)` while the frame is still incomplete, or `Ok(Some((payload_len,
/// consumed)))` where `consumed` covers the prefix plus the payload.
///
/// # Errors
///
/// Returns `CoralError::Protocol` when the declared length exceeds `max_frame_bytes`.
pub fn split_frame(buf: &[u8], max_frame_bytes: usize) -> CoralResult<Option<(usize, usize)>> {
    if buf.len() < LEN_PREFIX_BYTES {
        return Ok(None);
    }
    let declared = u32::from_le_bytes(
        buf[..LEN_PREFIX_BYTES]
            .try_into()
            .expect("slice is exactly four bytes"),
    ) as usize;
    if declared > max_frame_bytes {
        return Err(CoralError::Protocol(format!(
            "frame of {declared} bytes exceeds the {max_frame_bytes} byte limit"
        )));
    }
    if buf.len() < LEN_PREFIX_BYTES + declared {
        return Ok(None);
    }
    Ok(Some((declared, LEN_PREFIX_BYTES + declared)))
}

/// Decodes one request payload into its argument list.
///
/// # Errors
///
/// Returns `CoralError::Protocol` on a truncated payload, an argument count above `max_args`,
/// or trailing bytes after the last argument.
pub fn parse_request(payload: &[u8], max_args: usize) -> CoralResult<Vec<Vec<u8>>> {
    let mut cur = payload;
    let count = read_u32(&mut cur)? as usize;
    if count > max_args {
        return Err(CoralError::Protocol(format!(
            "{count} arguments exceed the {max_args} argument limit"
        )));
    }
    let mut args = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        let len = read_u32(&mut cur)? as usize;
        if cur.len() < len {
            return Err(CoralError::Protocol(
                "argument extends past the frame end".to_owned(),
            ));
        }
        args.push(cur[..len].to_vec());
        cur = &cur[len..];
    }
    if !cur.is_empty() {
        return Err(CoralError::Protocol(
            "trailing bytes after the last argument".to_owned(),
        ));
    }
    Ok(args)
}

/// Appends one length-prefixed response frame to `out`.
///
/// # Errors
///
/// Returns `CoralError::InvalidState` if the encoded payload exceeds `u32` length space.
pub fn encode_frame(reply: &CommandReply, out: &mut Vec<u8>) -> CoralResult<()> {
    let start = out.len();
    out.extend_from_slice(&[0_u8; LEN_PREFIX_BYTES]);
    reply.encode_payload(out);
    let payload_len = out.len() - start - LEN_PREFIX_BYTES;
    let Ok(declared) = u32::try_from(payload_len) else {
        out.truncate(start);
        return Err(CoralError::InvalidState(
            "response payload exceeds u32 frame space",
        ));
    };
    out[start..start + LEN_PREFIX_BYTES].copy_from_slice(&declared.to_le_bytes());
    Ok(())
}

fn read_u32(cur: &mut &[u8]) -> CoralResult<u32> {
    if cur.len() < 4 {
        return Err(CoralError::Protocol(
            "frame too short for a length field".to_owned(),
        ));
    }
    let value = u32::from_le_bytes(cur[..4].try_into().expect("slice is exactly four bytes"));
    *cur = &cur[4..];
    Ok(value)
}

/// Builds one request frame; shared by tests and the interactive tooling.
#[must_use]
pub fn encode_request(args: &[&[u8]]) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&(args.len() as u32).to_le_bytes());
    for arg in args {
        payload.extend_from_slice(&(arg.len() as u32).to_le_bytes());
        payload.extend_from_slice(arg);
    }
    let mut frame = Vec::with_capacity(LEN_PREFIX_BYTES + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    frame
}

#[cfg(test)]
mod tests {
    use super::{encode_frame, encode_request, parse_request, split_frame};
    use crate::command::{CommandReply, ErrorCode};
    use coral_common::error::CoralError;
    use googletest::prelude::*;
    use rstest::rstest;

    #[rstest]
    fn split_frame_waits_for_complete_input() {
        let frame = encode_request(&[b"GET", b"key"]);
        for cut in 0..frame.len() {
            assert_that!(
                split_frame(&frame[..cut], 1024).expect("prefixes are well formed"),
                eq(None)
            );
        }
        let (payload_len, consumed) = split_frame(&frame, 1024)
            .expect("frame is well formed")
            .expect("frame is complete");
        assert_that!(consumed, eq(frame.len()));
        assert_that!(payload_len, eq(frame.len() - 4));
    }

    #[rstest]
    fn oversized_frame_is_a_protocol_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(9_u32).to_le_bytes());
        let result = split_frame(&buf, 8);
        assert_that!(
            matches!(result, Err(CoralError::Protocol(_))),
            eq(true)
        );
    }

    #[rstest]
    fn request_round_trips_through_parse() {
        let frame = encode_request(&[b"SET", b"key", b"value"]);
        let args = parse_request(&frame[4..], 200_000).expect("request is well formed");
        assert_that!(
            &args,
            eq(&vec![b"SET".to_vec(), b"key".to_vec(), b"value".to_vec()])
        );
    }

    #[rstest]
    fn argument_count_ceiling_is_enforced() {
        let frame = encode_request(&[b"a", b"b", b"c"]);
        let result = parse_request(&frame[4..], 2);
        assert_that!(matches!(result, Err(CoralError::Protocol(_))), eq(true));
    }

    #[rstest]
    fn trailing_bytes_are_rejected() {
        let mut frame = encode_request(&[b"GET", b"key"]);
        frame.push(0xFF);
        let payload = &frame[4..];
        let result = parse_request(payload, 200_000);
        assert_that!(matches!(result, Err(CoralError::Protocol(_))), eq(true));
    }

    #[rstest]
    fn truncated_argument_is_rejected() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1_u32.to_le_bytes());
        payload.extend_from_slice(&100_u32.to_le_bytes());
        payload.extend_from_slice(b"short");
        let result = parse_request(&payload, 200_000);
        assert_that!(matches!(result, Err(CoralError::Protocol(_))), eq(true));
    }

    #[rstest]
    fn nil_encodes_to_a_single_tag_byte() {
        let mut out = Vec::new();
        encode_frame(&CommandReply::Nil, &mut out).expect("nil always fits");
        assert_that!(&out, eq(&vec![1, 0, 0, 0, 0]));
    }

    #[rstest]
    fn int_and_double_encode_little_endian_bodies() {
        let mut out = Vec::new();
        encode_frame(&CommandReply::Int(-2), &mut out).expect("int always fits");
        let mut expected = vec![9, 0, 0, 0, 3];
        expected.extend_from_slice(&(-2_i64).to_le_bytes());
        assert_that!(&out, eq(&expected));

        out.clear();
        encode_frame(&CommandReply::Double(1.5), &mut out).expect("double always fits");
        let mut expected = vec![9, 0, 0, 0, 4];
        expected.extend_from_slice(&1.5_f64.to_le_bytes());
        assert_that!(&out, eq(&expected));
    }

    #[rstest]
    fn error_reply_carries_code_and_message() {
        let mut out = Vec::new();
        encode_frame(
            &CommandReply::Err(ErrorCode::BadType, "not a string".to_owned()),
            &mut out,
        )
        .expect("error reply fits");
        // tag + code + msg len + msg
        let mut expected_payload = vec![1_u8];
        expected_payload.extend_from_slice(&3_u32.to_le_bytes());
        expected_payload.extend_from_slice(&12_u32.to_le_bytes());
        expected_payload.extend_from_slice(b"not a string");
        let mut expected = (expected_payload.len() as u32).to_le_bytes().to_vec();
        expected.extend_from_slice(&expected_payload);
        assert_that!(&out, eq(&expected));
    }

    #[rstest]
    fn arrays_nest_encoded_values() {
        let reply = CommandReply::Array(vec![
            CommandReply::Str(b"a".to_vec()),
            CommandReply::Double(1.0),
        ]);
        let mut out = Vec::new();
        encode_frame(&reply, &mut out).expect("array fits");
        let mut payload = vec![5_u8];
        payload.extend_from_slice(&2_u32.to_le_bytes());
        payload.push(2);
        payload.extend_from_slice(&1_u32.to_le_bytes());
        payload.push(b'a');
        payload.push(4);
        payload.extend_from_slice(&1.0_f64.to_le_bytes());
        let mut expected = (payload.len() as u32).to_le_bytes().to_vec();
        expected.extend_from_slice(&payload);
        assert_that!(&out, eq(&expected));
    }
}
