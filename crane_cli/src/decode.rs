//! Offline view of a raw frame payload, for checking captures by hand.

use crane_core::WireCommand;
use crane_core::fixed_point::{mm_to_m, read_be_i16};

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryView {
    pub mm: [i16; 3],
    pub m: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadView {
    pub len: usize,
    pub telemetry: Option<TelemetryView>,
    pub command: Option<WireCommand>,
}

pub fn view(bytes: &[u8]) -> PayloadView {
    let telemetry = (|| {
        let mm = [
            read_be_i16(bytes, 0)?,
            read_be_i16(bytes, 2)?,
            read_be_i16(bytes, 4)?,
        ];
        Some(TelemetryView {
            mm,
            m: mm.map(mm_to_m),
        })
    })();
    PayloadView {
        len: bytes.len(),
        telemetry,
        command: WireCommand::from_bytes(bytes),
    }
}

impl PayloadView {
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        json!({
            "len": self.len,
            "telemetry": self.telemetry.as_ref().map(|t| json!({
                "mm": t.mm,
                "m": t.m,
            })),
            "command": self.command.map(|c| json!({
                "weights_x": c.weights_x,
                "weights_y": c.weights_y,
                "wood_x": c.wood_x,
                "wood_y": c.wood_y,
                "grip": c.wood_y != 0,
            })),
        })
    }

    pub fn print_text(&self) {
        println!("payload: {} bytes", self.len);
        match &self.telemetry {
            Some(t) => println!(
                "telemetry: x={} y={} z={} mm  ({:.3}, {:.3}, {:.3}) m",
                t.mm[0], t.mm[1], t.mm[2], t.m[0], t.m[1], t.m[2]
            ),
            None => println!("telemetry: too short (need 6 bytes)"),
        }
        match &self.command {
            Some(c) => println!(
                "command: weights_x={} weights_y={} wood_x={} wood_y={} (grip {})",
                c.weights_x,
                c.weights_y,
                c.wood_x,
                c.wood_y,
                if c.wood_y != 0 { "closed" } else { "open" }
            ),
            None => println!("command: too short (need 8 bytes)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_payload_has_both_views() {
        let v = view(&[0x04, 0xB0, 0xFD, 0x0D, 0xFE, 0xFC, 0x00, 0x01]);
        let t = v.telemetry.clone().unwrap();
        assert_eq!(t.mm, [1200, -755, -260]);
        assert!((t.m[0] - 1.2).abs() < 1e-12);
        let c = v.command.unwrap();
        assert_eq!(c.wood_y, 1);
        assert_eq!(v.to_json()["command"]["grip"], true);
    }

    #[test]
    fn six_bytes_is_telemetry_only() {
        let v = view(&[0, 100, 0, 0, 0, 0]);
        assert_eq!(v.telemetry.unwrap().mm, [100, 0, 0]);
        assert!(v.command.is_none());
    }
}
