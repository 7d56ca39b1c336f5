//! Shared connection ingress for the runtime I/O loop and integration-style unit tests.

use coral_common::error::CoralResult;
use coral_core::command::{CommandReply, ErrorCode};
use coral_core::wire::{encode_frame, parse_request, split_frame, LEN_PREFIX_BYTES};

use crate::app::ServerApp;

/// Executes every complete request buffered in `incoming`, appending encoded replies to
/// `outgoing` in request order. Consumed request bytes are drained; a trailing partial frame
/// stays buffered for the next read. A reply that would exceed the frame ceiling is replaced
/// by a TOO_BIG error reply, keeping the connection usable.
///
/// # Errors
///
/// Returns protocol errors (oversized frame, malformed payload), which are fatal to the
/// connection that sent them.
pub(crate) fn drain_frames(
    app: &mut ServerApp,
    incoming: &mut Vec<u8>,
    outgoing: &mut Vec<u8>,
) -> CoralResult<usize> {
    let mut consumed_total = 0;
    let mut served = 0;
    while let Some((payload_len, consumed)) =
        split_frame(&incoming[consumed_total..], app.config.max_frame_bytes)?
    {
        let payload_start = consumed_total + LEN_PREFIX_BYTES;
        let payload = &incoming[payload_start..payload_start + payload_len];
        let args = parse_request(payload, app.config.max_args)?;
        let now_ms = app.clock.now_ms();
        let reply = app.registry.dispatch_args(&mut app.store, now_ms, &args);

        let reply_start = outgoing.len();
        encode_frame(&reply, outgoing)?;
        if outgoing.len() - reply_start - LEN_PREFIX_BYTES > app.config.max_frame_bytes {
            outgoing.truncate(reply_start);
            let too_big =
                CommandReply::Err(ErrorCode::TooBig, "response is too big".to_owned());
            encode_frame(&too_big, outgoing)?;
        }
        consumed_total += consumed;
        served += 1;
    }
    let _ = incoming.drain(..consumed_total);
    Ok(served)
}

#[cfg(test)]
mod tests {
    use super::drain_frames;
    use crate::app::ServerApp;
    use coral_common::config::ServerConfig;
    use coral_core::command::{CommandReply, ErrorCode};
    use coral_core::wire::{encode_frame, encode_request};
    use googletest::prelude::*;
    use rstest::rstest;

    fn encoded(reply: &CommandReply) -> Vec<u8> {
        let mut out = Vec::new();
        encode_frame(reply, &mut out).expect("test replies fit in a frame");
        out
    }

    #[rstest]
    fn pipelined_requests_get_ordered_replies() {
        let mut app = ServerApp::new(ServerConfig::default());
        let mut incoming = Vec::new();
        incoming.extend_from_slice(&encode_request(&[b"SET", b"k", b"v"]));
        incoming.extend_from_slice(&encode_request(&[b"GET", b"k"]));
        incoming.extend_from_slice(&encode_request(&[b"GET", b"missing"]));
        let mut outgoing = Vec::new();

        let served =
            drain_frames(&mut app, &mut incoming, &mut outgoing).expect("requests are valid");

        assert_that!(served, eq(3));
        assert_that!(incoming.is_empty(), eq(true));
        let mut expected = encoded(&CommandReply::Nil);
        expected.extend_from_slice(&encoded(&CommandReply::Str(b"v".to_vec())));
        expected.extend_from_slice(&encoded(&CommandReply::Nil));
        assert_that!(&outgoing, eq(&expected));
    }

    #[rstest]
    fn partial_trailing_frame_stays_buffered() {
        let mut app = ServerApp::new(ServerConfig::default());
        let mut incoming = encode_request(&[b"SET", b"k", b"v"]);
        let tail = encode_request(&[b"GET", b"k"]);
        incoming.extend_from_slice(&tail[..tail.len() - 3]);
        let mut outgoing = Vec::new();

        let served =
            drain_frames(&mut app, &mut incoming, &mut outgoing).expect("requests are valid");

        assert_that!(served, eq(1));
        assert_that!(&incoming, eq(&tail[..tail.len() - 3].to_vec()));
    }

    #[rstest]
    fn oversized_reply_degrades_to_a_too_big_error() {
        let config = ServerConfig {
            max_frame_bytes: 32,
            ..ServerConfig::default()
        };
        let mut app = ServerApp::new(config);
        let mut incoming = Vec::new();
        for n in 0..10_u8 {
            incoming.extend_from_slice(&encode_request(&[b"SET", &[b'k', n], b"v"]));
        }
        incoming.extend_from_slice(&encode_request(&[b"KEYS"]));
        let mut outgoing = Vec::new();

        let served =
            drain_frames(&mut app, &mut incoming, &mut outgoing).expect("requests are valid");

        assert_that!(served, eq(11));
        let expected_tail = encoded(&CommandReply::Err(
            ErrorCode::TooBig,
            "response is too big".to_owned(),
        ));
        assert_that!(outgoing.ends_with(&expected_tail), eq(true));
    }

    #[rstest]
    fn oversized_frame_is_fatal() {
        let config = ServerConfig {
            max_frame_bytes: 64,
            ..ServerConfig::default()
        };
        let mut app = ServerApp::new(config);
        let mut incoming = (1000_u32).to_le_bytes().to_vec();
        let mut outgoing = Vec::new();
        assert_that!(
            drain_frames(&mut app, &mut incoming, &mut outgoing).is_err(),
            eq(true)
        );
        assert_that!(outgoing.is_empty(), eq(true));
    }
}
