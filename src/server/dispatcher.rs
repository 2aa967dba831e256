//! Readiness main loop.
//!
//! One dispatcher thread owns the listener, the client table and the timer
//! list. It hands freshly read connections to the worker pool and gets them
//! back through the event registry: the worker re-arms the descriptor for
//! whichever direction comes next, and the next readiness event lands here
//! again. Because every connection descriptor is one-shot armed, the
//! dispatcher never touches a connection while a worker still holds it.

use std::collections::HashMap;
use std::io::Write;
use std::net::TcpListener;
use std::os::fd::{AsRawFd, RawFd};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::error;

use crate::config::{Config, TriggerMode};
use crate::http::connection::{Connection, ProcessOutcome, WriteOutcome};
use crate::logger::Logger;
use crate::pool::{Task, ThreadPool};
use crate::server::event::EventRegistry;
use crate::server::listener;
use crate::server::signal::ShutdownSignal;
use crate::timer::{TimerHandle, TimerList};

const BUSY_MESSAGE: &[u8] = b"Internal server busy";

fn lock<'a>(conn: &'a Mutex<Connection>) -> MutexGuard<'a, Connection> {
    match conn.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One queued unit of work: run the connection's parse/respond pipeline,
/// then re-arm its descriptor for whatever should happen next.
pub struct ConnTask {
    conn: Arc<Mutex<Connection>>,
    registry: Arc<EventRegistry>,
    logger: Logger,
    fd: RawFd,
}

impl Task for ConnTask {
    fn process(&self) {
        let outcome = lock(&self.conn).process();
        let rearm = match outcome {
            ProcessOutcome::NeedsMoreInput => self.registry.rearm_readable(self.fd),
            ProcessOutcome::WriteReady => self.registry.rearm_writable(self.fd),
            ProcessOutcome::Failed => {
                // Quiesced: no re-arm, the idle timer reclaims the slot on
                // the dispatcher thread.
                self.logger
                    .warn(&format!("connection fd {} failed during processing", self.fd));
                return;
            }
        };
        if let Err(err) = rearm {
            // The dispatcher may have torn the descriptor down in the
            // meantime (eviction); nothing left to do.
            self.logger
                .debug(&format!("re-arm of fd {} failed: {err}", self.fd));
        }
    }
}

struct Client {
    conn: Arc<Mutex<Connection>>,
    timer: TimerHandle,
}

pub struct Server {
    config: Arc<Config>,
    logger: Logger,
    listener: TcpListener,
    registry: Arc<EventRegistry>,
    pool: ThreadPool<ConnTask>,
    timers: TimerList,
    clients: HashMap<RawFd, Client>,
    signal: ShutdownSignal,
}

impl Server {
    /// Binds the listener, creates the epoll set and starts the worker pool.
    pub fn bind(config: Arc<Config>, logger: Logger) -> anyhow::Result<Server> {
        let listener = listener::bind(&config.server.listen_addr)?;
        let registry = Arc::new(EventRegistry::new(config.server.trigger_mode)?);
        registry.register_listener(listener.as_raw_fd())?;

        let signal = ShutdownSignal::install()?;
        registry.register_wakeup(signal.raw_fd())?;

        let pool = ThreadPool::new(config.limits.worker_threads, config.limits.queue_depth);

        Ok(Server {
            config,
            logger,
            listener,
            registry,
            pool,
            timers: TimerList::new(),
            clients: HashMap::new(),
            signal,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    fn timeslot(&self) -> Duration {
        Duration::from_secs(self.config.limits.timeslot_secs.max(1))
    }

    /// Idle deadline granted on connection activity.
    fn deadline(&self) -> Instant {
        Instant::now() + 3 * self.timeslot()
    }

    /// Runs until a shutdown signal arrives.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut events = vec![
            libc::epoll_event { events: 0, u64: 0 };
            self.config.limits.max_events.max(1)
        ];
        let timeslot = self.timeslot();
        let timeout_ms = i32::try_from(timeslot.as_millis()).unwrap_or(i32::MAX);
        let mut last_tick = Instant::now();
        let listener_fd = self.listener.as_raw_fd();
        let signal_fd = self.signal.raw_fd();

        self.logger.info("server running");
        loop {
            let ready = self.registry.wait(&mut events, timeout_ms)?;
            for event in &events[..ready] {
                let flags = event.events;
                let fd = event.u64 as RawFd;
                if fd == listener_fd {
                    self.accept_ready();
                } else if fd == signal_fd {
                    self.signal.drain();
                    self.logger.info("shutdown signal received");
                    tracing::info!("Shutdown signal received");
                    return Ok(());
                } else if flags
                    & (libc::EPOLLRDHUP as u32 | libc::EPOLLHUP as u32 | libc::EPOLLERR as u32)
                    != 0
                {
                    self.teardown(fd);
                } else if flags & libc::EPOLLIN as u32 != 0 {
                    self.readable(fd);
                } else if flags & libc::EPOLLOUT as u32 != 0 {
                    self.writable(fd);
                }
            }

            let now = Instant::now();
            if now.duration_since(last_tick) >= timeslot {
                self.tick(now);
                last_tick = now;
            }
        }
    }

    /// Stops the worker pool; queued jobs are drained first.
    pub fn shutdown(self) {
        self.pool.shutdown();
    }

    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    if self.clients.len() >= self.config.server.max_connections {
                        self.logger
                            .warn(&format!("connection table full, rejecting {peer}"));
                        let _ = stream.write_all(BUSY_MESSAGE);
                        continue;
                    }
                    match Connection::new(
                        stream,
                        peer,
                        Arc::clone(&self.config),
                        self.logger.clone(),
                    ) {
                        Ok(conn) => {
                            let fd = conn.raw_fd();
                            if let Err(err) = self.registry.register_connection(fd) {
                                self.logger
                                    .error(&format!("registering fd {fd} failed: {err}"));
                                continue;
                            }
                            let timer = self.timers.add(self.deadline(), fd as u64);
                            self.clients.insert(
                                fd,
                                Client {
                                    conn: Arc::new(Mutex::new(conn)),
                                    timer,
                                },
                            );
                            self.logger
                                .debug(&format!("accepted {peer} as fd {fd}"));
                        }
                        Err(err) => {
                            self.logger.error(&format!("accepting {peer} failed: {err}"));
                        }
                    }
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!("accept error: {err}");
                    self.logger.error(&format!("accept error: {err}"));
                    break;
                }
            }
            if self.registry.trigger_mode() == TriggerMode::Level {
                break;
            }
        }
    }

    fn readable(&mut self, fd: RawFd) {
        let Some((conn, timer)) = self.client_parts(fd) else {
            return;
        };
        if !lock(&conn).read_once() {
            self.teardown(fd);
            return;
        }
        self.timers.adjust(timer, self.deadline());
        let task = ConnTask {
            conn,
            registry: Arc::clone(&self.registry),
            logger: self.logger.clone(),
            fd,
        };
        if !self.pool.submit(task) {
            // Decided policy for a saturated pool: reject the connection
            // rather than buffer or busy-loop on it.
            self.logger
                .warn(&format!("worker queue full, dropping fd {fd}"));
            self.teardown(fd);
        }
    }

    fn writable(&mut self, fd: RawFd) {
        let Some((conn, timer)) = self.client_parts(fd) else {
            return;
        };
        match lock(&conn).write() {
            WriteOutcome::Again => {
                self.timers.adjust(timer, self.deadline());
                if self.registry.rearm_writable(fd).is_err() {
                    self.teardown(fd);
                }
            }
            WriteOutcome::Done => {
                self.timers.adjust(timer, self.deadline());
                if self.registry.rearm_readable(fd).is_err() {
                    self.teardown(fd);
                }
            }
            WriteOutcome::Closed => self.teardown(fd),
        }
    }

    fn client_parts(&self, fd: RawFd) -> Option<(Arc<Mutex<Connection>>, TimerHandle)> {
        self.clients
            .get(&fd)
            .map(|client| (Arc::clone(&client.conn), client.timer))
    }

    /// Removes a connection: timer out, epoll registration out, descriptor
    /// closed when the last reference to the connection drops.
    fn teardown(&mut self, fd: RawFd) {
        if let Some(client) = self.clients.remove(&fd) {
            self.timers.remove(client.timer);
            let _ = self.registry.deregister(fd);
            self.logger.debug(&format!("closing fd {fd}"));
        }
    }

    /// Evicts connections idle past their deadline, oldest first.
    fn tick(&mut self, now: Instant) {
        let Server {
            timers,
            clients,
            registry,
            logger,
            ..
        } = self;
        timers.tick(now, |token| {
            let fd = token as RawFd;
            if let Some(client) = clients.remove(&fd) {
                let _ = registry.deregister(fd);
                let peer = lock(&client.conn).peer();
                logger.info(&format!("idle connection from {peer} evicted (fd {fd})"));
            }
        });
    }
}
