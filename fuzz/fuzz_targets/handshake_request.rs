#![no_main]

use libfuzzer_sys::fuzz_target;
use socket_flow::request::parse_header_block;

// Fuzzes the server-side HTTP header parser directly. A malformed or
// truncated handshake request must produce an `Err`, never a panic.
fuzz_target!(|data: &[u8]| {
    let _ = parse_header_block(data, true);
    let _ = parse_header_block(data, false);
});
