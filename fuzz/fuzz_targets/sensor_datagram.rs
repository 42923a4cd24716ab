//! Fuzz harness for `WireMessage::parse`.
//!
//! Arbitrary datagram payloads must never panic the parser, and anything it
//! accepts must survive a re-encode unchanged.

#![no_main]
use libfuzzer_sys::fuzz_target;
use rocktimer_core::Source;
use rocktimer_wire::{WireMessage, MAX_MESSAGE_SIZE};

fuzz_target!(|data: &[u8]| {
    let Ok(message) = WireMessage::parse(data) else {
        return;
    };

    assert!(data.len() <= MAX_MESSAGE_SIZE);
    assert!(!message.device_id().is_empty());

    if let Ok(encoded) = message.encode() {
        if encoded.len() <= MAX_MESSAGE_SIZE {
            assert_eq!(WireMessage::parse(&encoded).ok(), Some(message.clone()));
        }
    }

    let _ = message.into_event(Source::Local);
});
