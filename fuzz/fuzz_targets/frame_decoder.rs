#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use socket_flow::frame::{DecodeOutcome, FrameDecoder};

// Fuzzes the frame decoder directly against arbitrary bytes rather than
// through a live TCP round-trip: the decoder is a pure function of its input
// buffer, so there's no socket needed to exercise every code path.
fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);
    let mut decoder = FrameDecoder::new();

    loop {
        match decoder.decode(&mut buf) {
            Ok(DecodeOutcome::Frame(_)) => continue,
            Ok(DecodeOutcome::NeedMore(_)) => break,
            Err(_) => break,
        }
    }
});
