// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::{self, Cursor};
use std::str;

use bytes::Buf;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Arrays nested deeper than this are rejected so that a hostile client cannot exhaust the stack.
pub const MAX_NESTING_DEPTH: usize = 32;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("stream ended in the middle of a frame")]
    Truncated,
    #[error("invalid frame data type: {0:#04x}")]
    InvalidDataType(u8),
    #[error("invalid length or count: {0:?}")]
    InvalidLength(String),
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUtf8(#[from] str::Utf8Error),
    #[error("array nesting exceeds {MAX_NESTING_DEPTH} levels")]
    NestingTooDeep,
    #[error("frame size of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How the connection loop reacts to a decode failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes on the wire do not form a frame. The connection is closed with a diagnostic.
    MalformedFrame,
    /// The underlying stream failed. The connection task aborts.
    IoFailure,
    /// The peer went away halfway through a frame. The connection is closed quietly.
    Truncated,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::IoFailure,
            Error::Incomplete | Error::Truncated => ErrorKind::Truncated,
            Error::InvalidDataType(_)
            | Error::InvalidLength(_)
            | Error::InvalidUtf8(_)
            | Error::NestingTooDeep
            | Error::FrameTooLarge { .. } => ErrorKind::MalformedFrame,
        }
    }
}

/// A decoded client command: the command name followed by its arguments.
///
/// Clients send commands as arrays of bulk strings, but any mix of arrays, bulk strings and
/// simple strings is accepted. Nested arrays are flattened in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    args: Vec<String>,
}

impl Frame {
    /// Parses a single frame starting at the current cursor position. On success the cursor is
    /// left on the first byte after the frame.
    ///
    /// With `at_eof` set the caller guarantees no more bytes will arrive, so an array that is cut
    /// short yields the elements decoded so far instead of `Error::Incomplete`.
    pub fn parse(src: &mut Cursor<&[u8]>, at_eof: bool) -> Result<Frame, Error> {
        let mut args = Vec::new();
        parse_value(src, at_eof, 0, &mut args)?;
        Ok(Frame { args })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

impl From<Vec<String>> for Frame {
    fn from(args: Vec<String>) -> Self {
        Frame { args }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

fn parse_value(
    src: &mut Cursor<&[u8]>,
    at_eof: bool,
    depth: usize,
    args: &mut Vec<String>,
) -> Result<(), Error> {
    // The first byte in an RESP-serialized payload always identifies its type.
    // Subsequent bytes constitute the type's contents.
    let first_byte = get_byte(src)?;
    let data_type = DataType::try_from(first_byte)?;

    match data_type {
        // +<string>\r\n
        DataType::SimpleString => {
            let line = get_line(src)?;
            args.push(str::from_utf8(line)?.to_string());
        }
        // $<length>\r\n<data>\r\n
        DataType::BulkString => {
            let length = parse_length(get_line(src)?)?;
            let total = length
                .checked_add(CRLF.len())
                .ok_or_else(|| Error::InvalidLength(length.to_string()))?;

            // The payload and its trailing CRLF are read as one block and trimmed together.
            let data = str::from_utf8(get_bytes(src, total)?)?;
            args.push(data.trim().to_string());
        }
        // *<number-of-elements>\r\n<element-1>...<element-n>
        DataType::Array => {
            if depth >= MAX_NESTING_DEPTH {
                return Err(Error::NestingTooDeep);
            }

            let count = match get_line(src) {
                Ok(line) => parse_count(line)?,
                Err(Error::Incomplete) if at_eof => return Ok(()),
                Err(err) => return Err(err),
            };

            for _ in 0..count {
                match parse_value(src, at_eof, depth + 1, args) {
                    Ok(()) => {}
                    // The peer hung up mid-command; keep every element that arrived in full.
                    Err(Error::Incomplete) if at_eof => return Ok(()),
                    Err(err) => return Err(err),
                }
            }
        }
    }

    Ok(())
}

fn parse_length(line: &[u8]) -> Result<usize, Error> {
    str::from_utf8(line)?
        .parse::<usize>()
        .map_err(|_| Error::InvalidLength(String::from_utf8_lossy(line).into_owned()))
}

// A negative count is the RESP null array, which carries no elements.
fn parse_count(line: &[u8]) -> Result<usize, Error> {
    let count = str::from_utf8(line)?
        .parse::<i64>()
        .map_err(|_| Error::InvalidLength(String::from_utf8_lossy(line).into_owned()))?;

    Ok(usize::try_from(count).unwrap_or(0))
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let line_end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((line_end + CRLF.len()) as u64);

    Ok(&buf[start..line_end])
}

fn get_bytes<'a>(src: &mut Cursor<&'a [u8]>, len: usize) -> Result<&'a [u8], Error> {
    if src.remaining() < len {
        return Err(Error::Incomplete);
    }

    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();
    src.advance(len);

    Ok(&buf[start..start + len])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}
