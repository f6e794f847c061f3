//! Fuzz target: `decode_frame`
//!
//! Arbitrary bytes must never panic the decoder.  Anything it accepts
//! must re-encode to exactly the bytes it consumed.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use terrahub::protocol::codec::{HEADER_SIZE, decode_frame, encode_frame};

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = decode_frame(data) {
        let len = HEADER_SIZE + frame.payload.len() + 1;
        assert!(len <= data.len(), "frame longer than input");

        let again = encode_frame(frame.head, frame.payload).expect("decoded payload fits");
        assert_eq!(again.as_slice(), &data[..len]);
    }
});
