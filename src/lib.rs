//! Rampart - Multi-threaded HTTP/1.1 static file server
//!
//! Built directly on non-blocking sockets and epoll: a dispatcher thread
//! turns readiness events into work for a fixed pool of workers, each
//! connection is an incremental state machine over fixed buffers, idle
//! connections are evicted by a sorted timer list, and logging runs through
//! an asynchronous bounded queue so it never blocks request processing.

pub mod config;
pub mod http;
pub mod logger;
pub mod pool;
pub mod queue;
pub mod server;
pub mod timer;
