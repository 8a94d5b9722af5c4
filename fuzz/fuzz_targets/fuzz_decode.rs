#![no_main]

use framelink::codec;
use libfuzzer_sys::fuzz_target;

// Throws arbitrary bytes at the frame decoder, in both strict and
// permissive opcode modes. Decoding must never panic; when a frame does
// come out, re-encoding it has to produce the size the length-form rules
// promise.
fuzz_target!(|data: &[u8]| {
    let _ = codec::decode(data, true);

    if let Ok(frame) = codec::decode(data, false) {
        let encoded = codec::encode(&frame, None);
        assert_eq!(encoded.len(), codec::encoded_len(frame.payload.len(), false));

        let masked = codec::encode(&frame, Some([0xDE, 0xAD, 0xBE, 0xEF]));
        assert_eq!(masked.len(), codec::encoded_len(frame.payload.len(), true));
    }
});
