//! Bus transports for the gantry controller.
//!
//! The default build only carries the simulated gantry, which speaks the same
//! frame layout as the effector board. The `hardware` feature adds a raw
//! SocketCAN transport on Linux.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod socketcan;

use crane_traits::{CanFrame, FrameSink, FrameSource};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::HwError;

/// Identifier the board listens on for motion commands.
pub const SIM_COMMAND_ID: u32 = 0x100;
/// Identifier the board publishes effector position on.
pub const SIM_TELEMETRY_ID: u32 = 0x101;

#[derive(Debug)]
struct GantryState {
    position_mm: [f64; 3],
    setpoint_mm: [f64; 3],
    grip: bool,
    last_step: Instant,
    commands_seen: u64,
    closed: bool,
}

impl GantryState {
    /// Move toward the setpoint, limited to `speed` mm/s along the straight line.
    fn step(&mut self, now: Instant, speed_mm_per_s: f64) {
        let dt = now.saturating_duration_since(self.last_step).as_secs_f64();
        self.last_step = now;
        let delta = [
            self.setpoint_mm[0] - self.position_mm[0],
            self.setpoint_mm[1] - self.position_mm[1],
            self.setpoint_mm[2] - self.position_mm[2],
        ];
        let dist = (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt();
        let reach = speed_mm_per_s * dt;
        if dist <= reach || dist == 0.0 {
            self.position_mm = self.setpoint_mm;
            return;
        }
        let f = reach / dist;
        for (p, d) in self.position_mm.iter_mut().zip(delta) {
            *p += d * f;
        }
    }
}

fn lock(state: &Mutex<GantryState>) -> MutexGuard<'_, GantryState> {
    match state.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Simulated gantry effector.
///
/// Command frames set the x/y setpoint in millimeters (fields 0 and 1), the
/// height (field 2, in counts of `1 / z_scale` m, raw meters by default) and
/// the gripper (field 3, non-zero = closed). Every telemetry poll advances the
/// effector toward the setpoint at a bounded speed and reports its position.
pub struct SimulatedGantry {
    state: Arc<Mutex<GantryState>>,
    speed_mm_per_s: f64,
    period: Duration,
    z_scale: f64,
}

impl Default for SimulatedGantry {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGantry {
    pub fn new() -> Self {
        SimulatedGantry {
            state: Arc::new(Mutex::new(GantryState {
                position_mm: [0.0; 3],
                setpoint_mm: [0.0; 3],
                grip: false,
                last_step: Instant::now(),
                commands_seen: 0,
                closed: false,
            })),
            speed_mm_per_s: 500.0,
            period: Duration::from_millis(2),
            z_scale: 1.0,
        }
    }

    /// Travel speed in mm/s.
    pub fn with_speed(mut self, mm_per_s: f64) -> Self {
        self.speed_mm_per_s = mm_per_s.max(0.0);
        self
    }

    /// Telemetry publish period.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_micros(100));
        self
    }

    /// Counts per meter in the height field; must match the sender's scale.
    pub fn with_z_scale(mut self, z_scale: f64) -> Self {
        if z_scale.is_finite() && z_scale > 0.0 {
            self.z_scale = z_scale;
        }
        self
    }

    /// Starting position (and setpoint) in millimeters.
    pub fn with_start_mm(self, xyz: [f64; 3]) -> Self {
        {
            let mut st = lock(&self.state);
            st.position_mm = xyz;
            st.setpoint_mm = xyz;
        }
        self
    }

    pub fn handle(&self) -> GantryHandle {
        GantryHandle {
            state: self.state.clone(),
        }
    }

    /// Split into the outbound command port and the inbound telemetry port.
    pub fn split(self) -> (SimCommandPort, SimTelemetryPort) {
        let cmd = SimCommandPort {
            state: self.state.clone(),
            z_mm_per_count: 1000.0 / self.z_scale,
        };
        let tel = SimTelemetryPort {
            state: self.state,
            speed_mm_per_s: self.speed_mm_per_s,
            period: self.period,
        };
        (cmd, tel)
    }
}

/// Read-only view plus a kill switch, for tests and self-checks.
#[derive(Clone)]
pub struct GantryHandle {
    state: Arc<Mutex<GantryState>>,
}

impl GantryHandle {
    pub fn position_mm(&self) -> [f64; 3] {
        lock(&self.state).position_mm
    }

    pub fn setpoint_mm(&self) -> [f64; 3] {
        lock(&self.state).setpoint_mm
    }

    pub fn grip(&self) -> bool {
        lock(&self.state).grip
    }

    pub fn commands_seen(&self) -> u64 {
        lock(&self.state).commands_seen
    }

    /// Simulate the link going down; both ports start failing.
    pub fn close(&self) {
        lock(&self.state).closed = true;
    }
}

pub struct SimCommandPort {
    state: Arc<Mutex<GantryState>>,
    z_mm_per_count: f64,
}

impl FrameSink for SimCommandPort {
    fn send(&mut self, frame: &CanFrame) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut st = lock(&self.state);
        if st.closed {
            return Err(Box::new(HwError::Closed));
        }
        if frame.id != SIM_COMMAND_ID || frame.payload().len() < 8 {
            tracing::trace!(id = frame.id, dlc = frame.dlc, "sim gantry ignored frame");
            return Ok(());
        }
        let d = frame.data;
        let field = |i: usize| f64::from(i16::from_be_bytes([d[2 * i], d[2 * i + 1]]));
        st.setpoint_mm = [field(0), field(1), field(2) * self.z_mm_per_count];
        st.grip = field(3) != 0.0;
        st.commands_seen = st.commands_seen.saturating_add(1);
        tracing::trace!(setpoint_mm = ?st.setpoint_mm, grip = st.grip, "sim gantry command");
        Ok(())
    }
}

pub struct SimTelemetryPort {
    state: Arc<Mutex<GantryState>>,
    speed_mm_per_s: f64,
    period: Duration,
}

impl FrameSource for SimTelemetryPort {
    fn recv(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<CanFrame>, Box<dyn std::error::Error + Send + Sync>> {
        if timeout < self.period {
            std::thread::sleep(timeout);
            return Ok(None);
        }
        std::thread::sleep(self.period);

        let mut st = lock(&self.state);
        if st.closed {
            return Err(Box::new(HwError::Closed));
        }
        st.step(Instant::now(), self.speed_mm_per_s);

        let mut payload = [0u8; 8];
        for (i, p) in st.position_mm.iter().enumerate() {
            let mm = p.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
            payload[2 * i..2 * i + 2].copy_from_slice(&mm.to_be_bytes());
        }
        Ok(Some(CanFrame::new(SIM_TELEMETRY_ID, &payload)))
    }
}
