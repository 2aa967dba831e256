//! Thin epoll wrapper and the readiness registry shared with workers.
//!
//! Connection descriptors are registered one-shot: a readiness event is
//! delivered once and the descriptor stays silent until someone re-arms it.
//! That discipline is what guarantees a connection is never delivered to two
//! threads at the same time. Whether events are edge- or level-triggered is
//! a runtime choice made once at startup.

use std::io;
use std::os::fd::RawFd;

use crate::config::TriggerMode;

pub struct Epoll {
    fd: RawFd,
}

impl Epoll {
    pub fn new() -> io::Result<Self> {
        // SAFETY: plain syscall; the returned descriptor is owned by Epoll.
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { fd })
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, events: u32) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events,
            u64: fd as u64,
        };
        // SAFETY: `event` outlives the call; fd validity is the caller's.
        let rc = unsafe { libc::epoll_ctl(self.fd, op, fd, &mut event) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn delete(&self, fd: RawFd) -> io::Result<()> {
        // SAFETY: the event argument is ignored for EPOLL_CTL_DEL.
        let rc = unsafe { libc::epoll_ctl(self.fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Blocks up to `timeout_ms` for readiness events. A signal interrupt
    /// reports zero events rather than an error.
    pub fn wait(&self, events: &mut [libc::epoll_event], timeout_ms: i32) -> io::Result<usize> {
        // SAFETY: the kernel writes at most `events.len()` entries.
        let rc = unsafe {
            libc::epoll_wait(
                self.fd,
                events.as_mut_ptr(),
                events.len() as libc::c_int,
                timeout_ms,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(rc as usize)
    }
}

impl Drop for Epoll {
    fn drop(&mut self) {
        // SAFETY: fd was obtained from epoll_create1 and is closed once.
        unsafe { libc::close(self.fd) };
    }
}

/// Shared handle for (re)arming descriptors; cloned into worker tasks via
/// `Arc`. epoll_ctl is thread-safe, so no locking is needed here.
pub struct EventRegistry {
    epoll: Epoll,
    mode: TriggerMode,
}

impl EventRegistry {
    pub fn new(mode: TriggerMode) -> io::Result<Self> {
        Ok(Self {
            epoll: Epoll::new()?,
            mode,
        })
    }

    pub fn trigger_mode(&self) -> TriggerMode {
        self.mode
    }

    fn edge_flag(&self) -> u32 {
        match self.mode {
            TriggerMode::Edge => libc::EPOLLET as u32,
            TriggerMode::Level => 0,
        }
    }

    fn conn_events(&self, interest: u32) -> u32 {
        interest | libc::EPOLLRDHUP as u32 | libc::EPOLLONESHOT as u32 | self.edge_flag()
    }

    /// Registers an always-armed readable descriptor (the signal pipe);
    /// level-triggered so a single pending byte keeps waking the loop.
    pub fn register_wakeup(&self, fd: RawFd) -> io::Result<()> {
        self.epoll.ctl(libc::EPOLL_CTL_ADD, fd, libc::EPOLLIN as u32)
    }

    /// Registers the listening socket: readable, no one-shot (accepting
    /// never moves off the dispatcher thread).
    pub fn register_listener(&self, fd: RawFd) -> io::Result<()> {
        self.epoll
            .ctl(libc::EPOLL_CTL_ADD, fd, libc::EPOLLIN as u32 | self.edge_flag())
    }

    /// Registers a connection descriptor, armed once for readability.
    pub fn register_connection(&self, fd: RawFd) -> io::Result<()> {
        self.epoll
            .ctl(libc::EPOLL_CTL_ADD, fd, self.conn_events(libc::EPOLLIN as u32))
    }

    pub fn rearm_readable(&self, fd: RawFd) -> io::Result<()> {
        self.epoll
            .ctl(libc::EPOLL_CTL_MOD, fd, self.conn_events(libc::EPOLLIN as u32))
    }

    pub fn rearm_writable(&self, fd: RawFd) -> io::Result<()> {
        self.epoll
            .ctl(libc::EPOLL_CTL_MOD, fd, self.conn_events(libc::EPOLLOUT as u32))
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        self.epoll.delete(fd)
    }

    pub fn wait(&self, events: &mut [libc::epoll_event], timeout_ms: i32) -> io::Result<usize> {
        self.epoll.wait(events, timeout_ms)
    }
}
