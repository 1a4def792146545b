use std::ffi::CString;
use std::mem::{size_of, zeroed};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

use crane_traits::{CAN_MAX_DLEN, CanFrame, FrameSink, FrameSource};
use tracing::trace;

use crate::error::{HwError, Result};

/// Raw SocketCAN socket bound to one interface (e.g. `can0`).
pub struct SocketCan {
    fd: OwnedFd,
    interface: String,
}

impl SocketCan {
    pub fn open(interface: &str) -> Result<Self> {
        let name = CString::new(interface)
            .map_err(|_| HwError::InterfaceNotFound(interface.to_string()))?;
        // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
        let ifindex = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if ifindex == 0 {
            return Err(HwError::InterfaceNotFound(interface.to_string()));
        }

        // SAFETY: plain socket(2) call; the result is checked before use.
        let raw = unsafe { libc::socket(libc::PF_CAN, libc::SOCK_RAW, libc::CAN_RAW) };
        if raw < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        // SAFETY: `raw` is a freshly created, owned descriptor.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: sockaddr_can is plain old data; all-zero is a valid starting value.
        let mut addr: libc::sockaddr_can = unsafe { zeroed() };
        addr.can_family = libc::AF_CAN as libc::sa_family_t;
        addr.can_ifindex = ifindex as libc::c_int;
        // SAFETY: `addr` outlives the call and the length matches its type.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_can).cast::<libc::sockaddr>(),
                size_of::<libc::sockaddr_can>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        tracing::info!(interface, ifindex, "socketcan bound");
        Ok(Self {
            fd,
            interface: interface.to_string(),
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Duplicate the descriptor so the receive thread and the control loop
    /// each own one half.
    pub fn split(self) -> Result<(SocketCanTx, SocketCanRx)> {
        let rx_fd = self.fd.try_clone()?;
        Ok((SocketCanTx { fd: self.fd }, SocketCanRx { fd: rx_fd }))
    }
}

pub struct SocketCanTx {
    fd: OwnedFd,
}

impl SocketCanTx {
    fn write_frame(&self, frame: &CanFrame) -> Result<()> {
        // SAFETY: can_frame is plain old data; all-zero is a valid value.
        let mut raw: libc::can_frame = unsafe { zeroed() };
        raw.can_id = frame.id;
        raw.can_dlc = frame.dlc.min(CAN_MAX_DLEN as u8);
        raw.data.copy_from_slice(&frame.data);
        let len = size_of::<libc::can_frame>();
        // SAFETY: `raw` is valid for `len` bytes for the duration of the call.
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                (&raw as *const libc::can_frame).cast::<libc::c_void>(),
                len,
            )
        };
        if n < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if n as usize != len {
            return Err(HwError::ShortWrite(n as usize));
        }
        trace!(id = frame.id, "can frame sent");
        Ok(())
    }
}

impl FrameSink for SocketCanTx {
    fn send(&mut self, frame: &CanFrame) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write_frame(frame).map_err(|e| Box::new(e) as _)
    }
}

pub struct SocketCanRx {
    fd: OwnedFd,
}

impl SocketCanRx {
    fn read_frame(&self, timeout: Duration) -> Result<Option<CanFrame>> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        // SAFETY: `pfd` is a single valid pollfd.
        let ready = unsafe { libc::poll(&mut pfd, 1, ms) };
        if ready < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if ready == 0 {
            return Ok(None);
        }

        // SAFETY: can_frame is plain old data; all-zero is a valid value.
        let mut raw: libc::can_frame = unsafe { zeroed() };
        let len = size_of::<libc::can_frame>();
        // SAFETY: `raw` is writable for `len` bytes.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                (&mut raw as *mut libc::can_frame).cast::<libc::c_void>(),
                len,
            )
        };
        if n < 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        if n == 0 {
            return Err(HwError::Closed);
        }
        let dlc = usize::from(raw.can_dlc).min(CAN_MAX_DLEN);
        let frame = CanFrame::new(raw.can_id & libc::CAN_EFF_MASK, &raw.data[..dlc]);
        trace!(id = frame.id, dlc, "can frame received");
        Ok(Some(frame))
    }
}

impl FrameSource for SocketCanRx {
    fn recv(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<CanFrame>, Box<dyn std::error::Error + Send + Sync>> {
        self.read_frame(timeout).map_err(|e| Box::new(e) as _)
    }
}
