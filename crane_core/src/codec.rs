//! Bus frame encoding for the effector board.
//!
//! Telemetry (`0x101`): bytes 0..6 carry x, y, z as big-endian `i16` millimeters;
//! bytes 6..8 are unused.
//!
//! Command (`0x100`): four big-endian `i16` fields in board order
//! `weights_x, weights_y, wood_x, wood_y`. The logical command maps onto them as
//! x and y (scaled by `position_scale`), z (scaled by `z_scale`, raw by default)
//! and the gripper flag (0/1).

use std::time::Instant;

use crane_traits::CanFrame;
use nalgebra::Vector3;

use crate::fixed_point::{mm_to_m, read_be_i16, scale_to_i16};
use crate::types::{Command, PoseSample};

pub const COMMAND_ID: u32 = 0x100;
pub const TELEMETRY_ID: u32 = 0x101;

/// Decode a telemetry frame received at `at`.
///
/// Returns `None` for frames with another identifier or fewer than six payload bytes.
pub fn decode_telemetry(frame: &CanFrame, telemetry_id: u32, at: Instant) -> Option<PoseSample> {
    if frame.id != telemetry_id {
        return None;
    }
    let p = frame.payload();
    let x = read_be_i16(p, 0)?;
    let y = read_be_i16(p, 2)?;
    let z = read_be_i16(p, 4)?;
    Some(PoseSample::new(
        Vector3::new(mm_to_m(x), mm_to_m(y), mm_to_m(z)),
        at,
    ))
}

/// Raw command fields exactly as the board reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireCommand {
    pub weights_x: i16,
    pub weights_y: i16,
    pub wood_x: i16,
    pub wood_y: i16,
}

impl WireCommand {
    pub fn from_command(cmd: &Command, position_scale: f64, z_scale: f64) -> Self {
        Self {
            weights_x: scale_to_i16(cmd.x, position_scale),
            weights_y: scale_to_i16(cmd.y, position_scale),
            wood_x: scale_to_i16(cmd.z, z_scale),
            wood_y: i16::from(cmd.grip),
        }
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        for (i, v) in [self.weights_x, self.weights_y, self.wood_x, self.wood_y]
            .into_iter()
            .enumerate()
        {
            out[2 * i..2 * i + 2].copy_from_slice(&v.to_be_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(Self {
            weights_x: read_be_i16(bytes, 0)?,
            weights_y: read_be_i16(bytes, 2)?,
            wood_x: read_be_i16(bytes, 4)?,
            wood_y: read_be_i16(bytes, 6)?,
        })
    }

    pub fn to_frame(self, command_id: u32) -> CanFrame {
        CanFrame::new(command_id, &self.to_bytes())
    }
}

/// Stateless logical-command to frame encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandEncoder {
    pub command_id: u32,
    pub position_scale: f64,
    /// Height channel multiplier. The board takes this field unscaled.
    pub z_scale: f64,
}

impl Default for CommandEncoder {
    fn default() -> Self {
        Self {
            command_id: COMMAND_ID,
            position_scale: crate::fixed_point::MM_PER_M,
            z_scale: crate::fixed_point::RAW_Z_SCALE,
        }
    }
}

impl CommandEncoder {
    pub fn encode(&self, cmd: &Command) -> CanFrame {
        WireCommand::from_command(cmd, self.position_scale, self.z_scale).to_frame(self.command_id)
    }
}
