//! Per-socket HTTP request/response state machine.
//!
//! A connection owns one non-blocking socket and two fixed buffers. Reads
//! accumulate into the read buffer under three cursors (`line_start <=
//! checked <= read_end <= capacity`); parsing resumes from wherever the last
//! readiness event left it, so a request may arrive in any number of
//! fragments. Responses are a header prefix assembled into the write buffer,
//! optionally followed by a read-only memory mapping of the served file, and
//! the two segments are drained with scatter writes.
//!
//! The caller must never invoke `read_once`, `process` or `write`
//! concurrently for the same connection; one-shot re-arming in the event
//! registry is what enforces that upstream.

use std::fmt;
use std::fs;
use std::io::{self, Cursor, IoSlice, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::ops::Range;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;

use memmap2::{Mmap, MmapOptions};

use crate::config::{Config, TriggerMode};
use crate::http::parser::{self, HeaderField, LineOutcome};
use crate::http::request::{Method, Request};
use crate::http::response::{EMPTY_PAGE, StatusCode};
use crate::logger::Logger;

/// What `process` decided; the caller re-arms or tears down accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A response is assembled; wait for the socket to become writable.
    WriteReady,
    /// The buffered bytes do not hold a complete request yet.
    NeedsMoreInput,
    /// Response assembly failed; the connection is quiesced.
    Failed,
}

/// What `write` decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The socket would block; re-arm for writable and resume later.
    Again,
    /// Response fully sent and keep-alive: state is reset, re-arm for the
    /// next request.
    Done,
    /// Error, peer gone, or a non-keep-alive response fully sent.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    RequestLine,
    Headers,
    Body,
}

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<Config>,
    logger: Logger,

    read_buf: Box<[u8]>,
    read_end: usize,
    checked: usize,
    line_start: usize,

    state: ParseState,
    request: Request,
    body: Option<Range<usize>>,

    write_buf: Box<[u8]>,
    write_end: usize,
    file: Option<Mmap>,
    bytes_sent: usize,
    bytes_to_send: usize,

    open: bool,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        config: Arc<Config>,
        logger: Logger,
    ) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        let read_buf = vec![0u8; config.limits.read_buffer_size].into_boxed_slice();
        let write_buf = vec![0u8; config.limits.write_buffer_size].into_boxed_slice();
        Ok(Self {
            stream,
            peer,
            config,
            logger,
            read_buf,
            read_end: 0,
            checked: 0,
            line_start: 0,
            state: ParseState::RequestLine,
            request: Request::default(),
            body: None,
            write_buf,
            write_end: 0,
            file: None,
            bytes_sent: 0,
            bytes_to_send: 0,
            open: true,
        })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Body bytes of the request currently buffered (POST only).
    pub fn body(&self) -> Option<&[u8]> {
        self.body.clone().map(|range| &self.read_buf[range])
    }

    /// Drains the socket into the read buffer.
    ///
    /// Under edge triggering the socket is read until the kernel reports no
    /// more data; under level triggering one read suffices, the next event
    /// will deliver the rest. Returns `false` when the peer closed, an error
    /// occurred, or the buffer was already full before any read was
    /// attempted.
    pub fn read_once(&mut self) -> bool {
        if !self.open || self.read_end >= self.read_buf.len() {
            return false;
        }
        loop {
            match self.stream.read(&mut self.read_buf[self.read_end..]) {
                Ok(0) => return false,
                Ok(n) => {
                    self.read_end += n;
                    if self.config.server.trigger_mode == TriggerMode::Level {
                        return true;
                    }
                    // Full buffer: stop here; process() decides whether what
                    // is buffered already forms a request.
                    if self.read_end == self.read_buf.len() {
                        return true;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return true,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => return false,
            }
        }
    }

    /// Runs the parsing/response pipeline over whatever is buffered.
    pub fn process(&mut self) -> ProcessOutcome {
        let Some(code) = self.process_read() else {
            return ProcessOutcome::NeedsMoreInput;
        };
        if self.process_write(code) {
            ProcessOutcome::WriteReady
        } else {
            self.logger.error(&format!(
                "response assembly overflowed write buffer for {}",
                self.peer
            ));
            self.fail();
            ProcessOutcome::Failed
        }
    }

    /// Drains the pending response through the socket.
    pub fn write(&mut self) -> WriteOutcome {
        if !self.open {
            return WriteOutcome::Closed;
        }
        if self.bytes_to_send == 0 {
            // Nothing pending (spurious writable event): go back to reading.
            self.reset();
            return WriteOutcome::Done;
        }
        loop {
            let header = &self.write_buf[self.bytes_sent.min(self.write_end)..self.write_end];
            let file_bytes: &[u8] = self.file.as_deref().unwrap_or(&[]);
            let file_off = self.bytes_sent.saturating_sub(self.write_end).min(file_bytes.len());
            let segments = [IoSlice::new(header), IoSlice::new(&file_bytes[file_off..])];

            match self.stream.write_vectored(&segments) {
                Ok(0) => {
                    self.file = None;
                    return WriteOutcome::Closed;
                }
                Ok(n) => {
                    self.bytes_sent += n;
                    self.bytes_to_send = self.bytes_to_send.saturating_sub(n);
                    if self.bytes_to_send == 0 {
                        // Mapping released on every exit path from here on.
                        self.file = None;
                        if self.request.keep_alive {
                            self.logger.debug(&format!(
                                "response sent to {}, keeping connection",
                                self.peer
                            ));
                            self.reset();
                            return WriteOutcome::Done;
                        }
                        return WriteOutcome::Closed;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return WriteOutcome::Again,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => {
                    self.file = None;
                    return WriteOutcome::Closed;
                }
            }
        }
    }

    /// Marks the connection dead; the owner reclaims it.
    pub fn fail(&mut self) {
        self.open = false;
        self.file = None;
    }

    /// Returns the request to its initial state after a keep-alive cycle.
    /// The socket stays open; everything else starts over.
    fn reset(&mut self) {
        self.read_end = 0;
        self.checked = 0;
        self.line_start = 0;
        self.state = ParseState::RequestLine;
        self.request = Request::default();
        self.body = None;
        self.write_end = 0;
        self.file = None;
        self.bytes_sent = 0;
        self.bytes_to_send = 0;
    }

    /// Consumes buffered lines until the request completes, more input is
    /// needed (`None`), or a verdict is reached.
    fn process_read(&mut self) -> Option<StatusCode> {
        loop {
            if self.state == ParseState::Body {
                let have = self.read_end - self.line_start;
                if have < self.request.content_length {
                    return None;
                }
                let start = self.line_start;
                let end = start + self.request.content_length;
                self.body = Some(start..end);
                self.line_start = end;
                self.checked = self.checked.max(end);
                return Some(self.resolve_resource());
            }

            match parser::scan_line(&self.read_buf, self.checked, self.read_end) {
                LineOutcome::Open => return None,
                LineOutcome::Malformed => {
                    // Protocol errors end the connection after the response;
                    // resource errors (missing file, directory) leave it
                    // reusable.
                    self.request.keep_alive = false;
                    return Some(StatusCode::BadRequest);
                }
                LineOutcome::Complete { line_end, next } => {
                    let line = self.line_start..line_end;
                    self.checked = next;
                    self.line_start = next;
                    match self.state {
                        ParseState::RequestLine => {
                            match parser::parse_request_line(&self.read_buf[line]) {
                                Ok((method, path)) => {
                                    self.logger.info(&format!(
                                        "{} {} from {}",
                                        method.as_str(),
                                        path,
                                        self.peer
                                    ));
                                    self.request.method = method;
                                    self.request.path = path;
                                    self.state = ParseState::Headers;
                                }
                                Err(err) => {
                                    self.logger.info(&format!(
                                        "rejected request from {}: {}",
                                        self.peer, err
                                    ));
                                    self.request.keep_alive = false;
                                    return Some(StatusCode::BadRequest);
                                }
                            }
                        }
                        ParseState::Headers => {
                            if line.is_empty() {
                                // Content-Length only matters for POST.
                                if self.request.method == Method::Get
                                    || self.request.content_length == 0
                                {
                                    return Some(self.resolve_resource());
                                }
                                self.state = ParseState::Body;
                            } else {
                                match parser::parse_header(&self.read_buf[line]) {
                                    HeaderField::Connection { keep_alive } => {
                                        self.request.keep_alive = keep_alive;
                                    }
                                    HeaderField::ContentLength(n) => {
                                        self.request.content_length = n;
                                    }
                                    HeaderField::Host(host) => {
                                        self.request.host = Some(host);
                                    }
                                    HeaderField::Other => {}
                                }
                            }
                        }
                        ParseState::Body => unreachable!("handled above"),
                    }
                }
            }
        }
    }

    /// Maps the requested path onto the web root and, on success, mmaps the
    /// file read-only. The descriptor is closed right away; the mapping
    /// outlives it and is released when the send completes or the
    /// connection dies.
    fn resolve_resource(&mut self) -> StatusCode {
        // Plain concatenation, as served paths always start with '/'.
        // Note: no `..` canonicalization is applied here.
        let mut full = self.config.server.web_root.as_os_str().to_os_string();
        full.push(&self.request.path);
        let full = PathBuf::from(full);

        let Ok(meta) = fs::metadata(&full) else {
            return StatusCode::NotFound;
        };
        if meta.permissions().mode() & 0o004 == 0 {
            return StatusCode::Forbidden;
        }
        if meta.is_dir() {
            return StatusCode::BadRequest;
        }
        if meta.len() == 0 {
            // Zero-length mappings are invalid; a canned empty page is
            // served instead.
            self.file = None;
            return StatusCode::Ok;
        }
        let Ok(file) = fs::File::open(&full) else {
            return StatusCode::NotFound;
        };
        // SAFETY: the mapping is private and read-only; the server never
        // writes to served files while they are mapped.
        match unsafe { MmapOptions::new().map_copy_read_only(&file) } {
            Ok(map) => {
                self.file = Some(map);
                StatusCode::Ok
            }
            Err(err) => {
                self.logger.error(&format!("mmap of {} failed: {err}", full.display()));
                StatusCode::InternalError
            }
        }
    }

    /// Assembles the status line, headers and (for errors) the inline body
    /// into the write buffer. Returns `false` on overflow, which aborts the
    /// response.
    fn process_write(&mut self, code: StatusCode) -> bool {
        self.write_end = 0;
        self.bytes_sent = 0;
        self.bytes_to_send = 0;

        if !self.add_status_line(code) {
            return false;
        }
        if code == StatusCode::Ok {
            match self.file.as_ref().map(|map| map.len()) {
                Some(file_len) => {
                    if !self.add_headers(file_len) {
                        return false;
                    }
                    self.bytes_to_send = self.write_end + file_len;
                }
                None => {
                    if !(self.add_headers(EMPTY_PAGE.len()) && self.add_content(EMPTY_PAGE)) {
                        return false;
                    }
                    self.bytes_to_send = self.write_end;
                }
            }
        } else {
            let body = code.canned_body();
            if !(self.add_headers(body.len()) && self.add_content(body)) {
                return false;
            }
            self.bytes_to_send = self.write_end;
        }
        true
    }

    fn add_status_line(&mut self, code: StatusCode) -> bool {
        self.add_response(format_args!(
            "HTTP/1.1 {} {}\r\n",
            code.as_u16(),
            code.reason_phrase()
        ))
    }

    fn add_headers(&mut self, content_len: usize) -> bool {
        let linger = if self.request.keep_alive { "keep-alive" } else { "close" };
        self.add_response(format_args!("Content-Length: {content_len}\r\n"))
            && self.add_response(format_args!("Connection: {linger}\r\n"))
            && self.add_response(format_args!("\r\n"))
    }

    fn add_content(&mut self, content: &str) -> bool {
        self.add_response(format_args!("{content}"))
    }

    /// Appends formatted text to the write buffer; `false` means it would
    /// not fit.
    fn add_response(&mut self, args: fmt::Arguments<'_>) -> bool {
        if self.write_end >= self.write_buf.len() {
            return false;
        }
        let mut cursor = Cursor::new(&mut self.write_buf[self.write_end..]);
        if cursor.write_fmt(args).is_err() {
            return false;
        }
        self.write_end += cursor.position() as usize;
        true
    }
}
