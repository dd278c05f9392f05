//! Route catalog and response rendering shared by every front-end.
//!
//! The host service answers real HTTP requests; the firmware answers one
//! request line per USB CDC line. Both agree on the same three routes and the
//! same JSON bodies, rendered here through `core::fmt::Write` so the MCU can
//! format into a `heapless::String` without an allocator.

use core::fmt::{self, Write};

use embassy_sync::blocking_mutex::raw::RawMutex;
use winnow::ascii::{space0, space1};
use winnow::combinator::{opt, preceded};
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

use crate::pulse::PulseInstant;
use crate::query::{AnalogSource, QueryInterface, SpeedReading, Voltage};

/// Static payload served on `/`.
pub const GREETING: &str = "Hello Maams";

/// TCP port the service binds on every interface.
pub const DEFAULT_PORT: u16 = 8081;

/// JSON key carrying the speed value.
pub const SPEED_KEY: &str = "speed_level";

/// JSON key carrying the potentiometer voltage.
pub const POTENTIOMETER_KEY: &str = "potentiometer_voltage";

/// Externally visible routes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Route {
    Index,
    Speed,
    Potentiometer,
}

impl Route {
    pub const ALL: [Route; 3] = [Route::Index, Route::Speed, Route::Potentiometer];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Route::Index => "/",
            Route::Speed => "/speed",
            Route::Potentiometer => "/potentiometer",
        }
    }

    /// Resolves a request target, ignoring any query string.
    #[must_use]
    pub fn from_target(target: &str) -> Option<Self> {
        let path = target.split_once('?').map_or(target, |(path, _)| path);
        Self::ALL.into_iter().find(|route| route.path() == path)
    }
}

/// Request method, reduced to what the routes care about.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Method {
    Get,
    Head,
    Other,
}

impl Method {
    fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("GET") {
            Method::Get
        } else if token.eq_ignore_ascii_case("HEAD") {
            Method::Head
        } else {
            Method::Other
        }
    }
}

/// Parsed `METHOD target [HTTP/x.y]` line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RequestLine<'a> {
    pub method: Method,
    pub target: &'a str,
    pub version: Option<&'a str>,
}

/// Response status codes used by the routes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Status {
    Ok,
    BadRequest,
    NotFound,
    MethodNotAllowed,
    ServiceUnavailable,
}

impl Status {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::MethodNotAllowed => 405,
            Status::ServiceUnavailable => 503,
        }
    }

    /// Short lowercase description also used as the JSON error message.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::BadRequest => "bad request",
            Status::NotFound => "not found",
            Status::MethodNotAllowed => "method not allowed",
            Status::ServiceUnavailable => "sensor unavailable",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised while decoding a request line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequestError {
    Empty,
    Syntax,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Empty => f.write_str("empty request line"),
            RequestError::Syntax => f.write_str("malformed request line"),
        }
    }
}

fn method(input: &mut &str) -> ModalResult<Method> {
    take_while(1.., |c: char| c.is_ascii_alphabetic())
        .map(Method::from_token)
        .parse_next(input)
}

fn target<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    take_till(1.., |c: char| c.is_ascii_whitespace()).parse_next(input)
}

fn version<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    preceded(
        "HTTP/",
        take_while(1.., |c: char| c.is_ascii_digit() || c == '.'),
    )
    .parse_next(input)
}

fn request_line<'s>(input: &mut &'s str) -> ModalResult<RequestLine<'s>> {
    let method = method.parse_next(input)?;
    let target = preceded(space1, target).parse_next(input)?;
    let version = opt(preceded(space1, version)).parse_next(input)?;
    space0.parse_next(input)?;
    Ok(RequestLine {
        method,
        target,
        version,
    })
}

/// Parses a single request line such as `GET /speed HTTP/1.1`.
///
/// # Errors
///
/// Returns [`RequestError::Empty`] for a blank line and
/// [`RequestError::Syntax`] when the line is not `METHOD target [HTTP/x.y]`.
pub fn parse_request_line(line: &str) -> Result<RequestLine<'_>, RequestError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(RequestError::Empty);
    }
    request_line
        .parse(trimmed)
        .map_err(|_| RequestError::Syntax)
}

/// Maps a parsed request onto a route or the status explaining why not.
///
/// # Errors
///
/// [`Status::NotFound`] for an unknown target and
/// [`Status::MethodNotAllowed`] for anything but `GET` or `HEAD`.
pub fn resolve(request: &RequestLine<'_>) -> Result<Route, Status> {
    let route = Route::from_target(request.target).ok_or(Status::NotFound)?;
    match request.method {
        Method::Get | Method::Head => Ok(route),
        Method::Other => Err(Status::MethodNotAllowed),
    }
}

/// Writes `{"speed_level":<n>}`; levels are integers, reverse is the sentinel.
///
/// # Errors
///
/// Propagates the writer's [`fmt::Error`], e.g. a full buffer.
pub fn write_speed_body<W: Write>(
    writer: &mut W,
    reading: SpeedReading,
    sentinel: f32,
) -> fmt::Result {
    write!(writer, "{{\"{SPEED_KEY}\":")?;
    match reading {
        SpeedReading::Level(level) => write!(writer, "{level}")?,
        SpeedReading::Reverse => write_json_number(writer, sentinel)?,
    }
    writer.write_char('}')
}

/// Writes `{"potentiometer_voltage":<v>}`.
///
/// # Errors
///
/// Propagates the writer's [`fmt::Error`].
pub fn write_potentiometer_body<W: Write>(writer: &mut W, voltage: Voltage) -> fmt::Result {
    write!(writer, "{{\"{POTENTIOMETER_KEY}\":")?;
    write_json_number(writer, voltage)?;
    writer.write_char('}')
}

/// Writes `{"error":"<reason>"}`.
///
/// # Errors
///
/// Propagates the writer's [`fmt::Error`].
pub fn write_error_body<W: Write>(writer: &mut W, status: Status) -> fmt::Result {
    write!(writer, "{{\"error\":\"{}\"}}", status.reason())
}

fn write_json_number<W: Write>(writer: &mut W, value: f32) -> fmt::Result {
    if value.is_finite() {
        write!(writer, "{value}")
    } else {
        writer.write_str("null")
    }
}

/// Answers one request line as `<status> <body>`, returning the status.
///
/// Speed reads go through [`QueryInterface::get_speed_at`], which matches
/// [`QueryInterface::get_speed`] whenever no staleness window is configured.
/// A `HEAD` request gets the status alone, with no body.
///
/// # Errors
///
/// Propagates the writer's [`fmt::Error`]; request and sensor failures are
/// rendered as error lines instead.
pub fn respond<M, TInstant, A, W>(
    query: &mut QueryInterface<'_, M, TInstant, A>,
    line: &str,
    now: TInstant,
    writer: &mut W,
) -> Result<Status, fmt::Error>
where
    M: RawMutex,
    TInstant: PulseInstant,
    A: AnalogSource,
    W: Write,
{
    let (method, route) = match parse_request_line(line) {
        Ok(request) => (request.method, resolve(&request)),
        Err(_) => (Method::Other, Err(Status::BadRequest)),
    };

    let reply = match route {
        Ok(Route::Index) => Reply::Greeting,
        Ok(Route::Speed) => Reply::Speed(query.get_speed_at(now)),
        Ok(Route::Potentiometer) => match query.get_analog_reading() {
            Ok(voltage) => Reply::Voltage(voltage),
            Err(_) => Reply::Error(Status::ServiceUnavailable),
        },
        Err(status) => Reply::Error(status),
    };

    let status = reply.status();
    write!(writer, "{status}")?;
    if method != Method::Head {
        writer.write_char(' ')?;
        match reply {
            Reply::Greeting => writer.write_str(GREETING)?,
            Reply::Speed(reading) => {
                write_speed_body(writer, reading, query.config().reverse_sentinel)?;
            }
            Reply::Voltage(voltage) => write_potentiometer_body(writer, voltage)?,
            Reply::Error(status) => write_error_body(writer, status)?,
        }
    }
    Ok(status)
}

enum Reply {
    Greeting,
    Speed(SpeedReading),
    Voltage(Voltage),
    Error(Status),
}

impl Reply {
    const fn status(&self) -> Status {
        match self {
            Reply::Greeting | Reply::Speed(_) | Reply::Voltage(_) => Status::Ok,
            Reply::Error(status) => *status,
        }
    }
}
