//! Fuzz harness for `ControlMessage::parse` on observer text frames.

#![no_main]
use libfuzzer_sys::fuzz_target;
use rocktimer_wire::ControlMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = ControlMessage::parse(text);
    }
});
