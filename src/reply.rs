use std::fmt;

static CRLF: &[u8; 2] = b"\r\n";

/// A reply sent back to the client for a single command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// `+<text>\r\n`
    Simple(String),
    /// `$-1\r\n`, the null bulk string used for absent values.
    Null,
    /// `-<text>\r\n`
    Error(String),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Simple("OK".to_string())
    }

    pub fn pong() -> Reply {
        Reply::Simple("PONG".to_string())
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Reply::Simple(s) => line(b'+', s),
            Reply::Error(s) => line(b'-', s),
            Reply::Null => {
                let mut bytes = Vec::with_capacity(5);
                bytes.extend_from_slice(b"$-1");
                bytes.extend_from_slice(CRLF);
                bytes
            }
        }
    }
}

fn line(marker: u8, s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
    bytes.push(marker);
    bytes.extend_from_slice(s.as_bytes());
    bytes.extend_from_slice(CRLF);
    bytes
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Simple(s) => write!(f, "+{}", s),
            Reply::Error(s) => write!(f, "-{}", s),
            Reply::Null => write!(f, "$-1"),
        }
    }
}
