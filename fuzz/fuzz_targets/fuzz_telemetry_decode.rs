#![no_main]
use libfuzzer_sys::fuzz_target;
use std::time::Instant;

use crane_core::{TELEMETRY_ID, WireCommand, decode_telemetry};
use crane_traits::CanFrame;

fuzz_target!(|data: &[u8]| {
    let frame = CanFrame::new(TELEMETRY_ID, data);
    if let Some(sample) = decode_telemetry(&frame, TELEMETRY_ID, Instant::now()) {
        // i16 millimeters always land within +-32.768 m.
        assert!(sample.position.iter().all(|v| v.abs() <= 32.768));
    }
    if let Some(cmd) = WireCommand::from_bytes(data) {
        assert_eq!(WireCommand::from_bytes(&cmd.to_bytes()), Some(cmd));
    }
});
