use std::fmt;
use std::io;

/// Error is returned by every fallible operation of the pinger.
#[derive(Debug)]
pub enum Error {
    /// The target could not be turned into an IPv4 address.
    Resolution { target: String, reason: String },
    /// The ICMP socket could not be opened, written or read.
    Transport { context: &'static str, source: io::Error },
    /// The outgoing echo request could not be serialized.
    Encoding(String),
    /// The received bytes are not a well-formed ICMP message.
    Decoding(String),
}

impl Error {
    /// Only a malformed reply is survivable, the next probe gets a fresh socket.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Decoding(_))
    }

    pub(crate) fn transport(context: &'static str, source: io::Error) -> Self {
        Error::Transport { context, source }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Resolution { target, reason } => {
                write!(f, "fail to resolve {}: {}", target, reason)
            }
            Error::Transport { context, source } => write!(f, "{}: {}", context, source),
            Error::Encoding(msg) => write!(f, "fail to encode echo request: {}", msg),
            Error::Decoding(msg) => write!(f, "fail to decode icmp message: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}
