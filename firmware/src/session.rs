//! Request-line session carried over the USB CDC link.
//!
//! Bytes from the host are assembled into lines; every complete line is one
//! request (`GET /speed`, `GET /potentiometer`, `GET /`) answered with a
//! single `<status> <body>` line. `HEAD` requests get the status alone.

use core::fmt::Write as _;
use core::str;

use embassy_sync::blocking_mutex::raw::RawMutex;
use heapless::{String, Vec};
use wheel_core::api::{self, Status};
use wheel_core::pulse::PulseInstant;
use wheel_core::query::{AnalogSource, QueryInterface};

/// Maximum number of bytes accepted on a single request line (excluding terminator).
pub const MAX_LINE_LEN: usize = 96;

/// Capacity of one rendered response line, terminator included.
pub const MAX_RESPONSE_LEN: usize = 64;

pub type ResponseLine = String<MAX_RESPONSE_LEN>;

/// Problems with an assembled line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineError {
    /// The line grew past [`MAX_LINE_LEN`]; the rest of it was discarded.
    Overflow,
    /// The line is not valid UTF-8.
    InvalidUtf8,
}

/// Outcome of feeding one byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Ingest {
    /// More bytes are needed.
    Pending,
    /// A complete line is available through [`LineAssembler::line`].
    Line,
    /// A terminator ended a line that could not be kept.
    Rejected(LineError),
}

/// Collects bytes until CR or LF.
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
    ready: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            overflowed: false,
            ready: false,
        }
    }

    /// Feeds a single byte. The previous line is discarded on the first byte
    /// after it was reported.
    pub fn ingest(&mut self, byte: u8) -> Ingest {
        if self.ready {
            self.buffer.clear();
            self.ready = false;
        }

        match byte {
            b'\r' | b'\n' => {
                if self.overflowed {
                    self.overflowed = false;
                    self.buffer.clear();
                    return Ingest::Rejected(LineError::Overflow);
                }
                if self.buffer.is_empty() {
                    return Ingest::Pending;
                }
                self.ready = true;
                Ingest::Line
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ingest::Pending
            }
            value => {
                if !self.overflowed && self.buffer.push(value).is_err() {
                    self.overflowed = true;
                }
                Ingest::Pending
            }
        }
    }

    /// The completed line, valid until the next call to [`Self::ingest`].
    pub fn line(&self) -> Result<&str, LineError> {
        str::from_utf8(self.buffer.as_slice()).map_err(|_| LineError::InvalidUtf8)
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.overflowed = false;
        self.ready = false;
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders the response for one request line, CRLF-terminated.
pub fn answer<M, TInstant, A>(
    query: &mut QueryInterface<'_, M, TInstant, A>,
    line: &str,
    now: TInstant,
    out: &mut ResponseLine,
) -> Status
where
    M: RawMutex,
    TInstant: PulseInstant,
    A: AnalogSource,
{
    out.clear();
    let status = match api::respond(query, line, now, out) {
        Ok(status) => status,
        Err(_) => {
            out.clear();
            reject(out, Status::ServiceUnavailable)
        }
    };
    terminate(out);
    status
}

/// Renders the error line for input that never became a request.
pub fn answer_rejected(error: LineError, out: &mut ResponseLine) -> Status {
    out.clear();
    let status = match error {
        LineError::Overflow | LineError::InvalidUtf8 => reject(out, Status::BadRequest),
    };
    terminate(out);
    status
}

fn reject(out: &mut ResponseLine, status: Status) -> Status {
    // Error lines are short enough to always fit.
    let _ = write!(out, "{status} ");
    let _ = api::write_error_body(out, status);
    status
}

fn terminate(out: &mut ResponseLine) {
    let _ = out.push_str("\r\n");
}
