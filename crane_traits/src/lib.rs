pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Classic CAN payload size.
pub const CAN_MAX_DLEN: usize = 8;

/// A classic (non-FD) CAN frame as seen by the control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CanFrame {
    pub id: u32,
    pub dlc: u8,
    pub data: [u8; CAN_MAX_DLEN],
}

impl CanFrame {
    /// Build a frame from up to eight payload bytes; extra bytes are dropped.
    pub fn new(id: u32, payload: &[u8]) -> Self {
        let n = payload.len().min(CAN_MAX_DLEN);
        let mut data = [0u8; CAN_MAX_DLEN];
        data[..n].copy_from_slice(&payload[..n]);
        Self {
            id,
            dlc: n as u8,
            data,
        }
    }

    /// The valid payload bytes (`data[..dlc]`).
    pub fn payload(&self) -> &[u8] {
        &self.data[..usize::from(self.dlc).min(CAN_MAX_DLEN)]
    }
}

/// Outbound half of the bus transport.
pub trait FrameSink {
    fn send(&mut self, frame: &CanFrame) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Inbound half of the bus transport.
///
/// `recv` blocks for at most `timeout`; `Ok(None)` means nothing arrived in time.
pub trait FrameSource {
    fn recv(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<CanFrame>, Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn send(&mut self, frame: &CanFrame) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).send(frame)
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn recv(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Option<CanFrame>, Box<dyn std::error::Error + Send + Sync>> {
        (**self).recv(timeout)
    }
}
