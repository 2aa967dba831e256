//! Signal-to-wakeup plumbing.
//!
//! SIGINT and SIGTERM handlers do the only async-signal-safe thing possible:
//! write one byte into a non-blocking pipe whose read end sits in the epoll
//! set, so the dispatcher observes shutdown as just another readiness event.

use std::io;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};

static WAKEUP_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn forward_signal(_sig: libc::c_int) {
    let fd = WAKEUP_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = 1u8;
        // SAFETY: write(2) is async-signal-safe; the fd is non-blocking.
        unsafe { libc::write(fd, std::ptr::from_ref(&byte).cast(), 1) };
    }
}

pub struct ShutdownSignal {
    read_fd: RawFd,
}

impl ShutdownSignal {
    /// Creates the self-pipe and installs the SIGINT/SIGTERM handlers.
    /// Intended to be called once per process.
    pub fn install() -> io::Result<Self> {
        let mut fds = [0 as RawFd; 2];
        // SAFETY: fds is a valid two-element array for pipe2 to fill.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        WAKEUP_FD.store(fds[1], Ordering::Relaxed);

        let handler: extern "C" fn(libc::c_int) = forward_signal;
        for sig in [libc::SIGINT, libc::SIGTERM] {
            // SAFETY: zeroed sigaction is a valid starting point; the mask
            // is filled so the handler is not interrupted by other signals.
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = handler as usize;
                libc::sigfillset(&mut action.sa_mask);
                if libc::sigaction(sig, &action, std::ptr::null_mut()) < 0 {
                    return Err(io::Error::last_os_error());
                }
            }
        }
        Ok(Self { read_fd: fds[0] })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Discards any bytes queued by the handler.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            // SAFETY: buf is a valid writable buffer of the given length.
            let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                break;
            }
        }
    }
}

impl Drop for ShutdownSignal {
    fn drop(&mut self) {
        // The write end stays open for the handlers' whole process lifetime.
        // SAFETY: read_fd came from pipe2 and is closed once.
        unsafe { libc::close(self.read_fd) };
    }
}
