//! Error and result type for SMTP clients

use std::{error::Error as StdError, fmt, io};

use crate::{
    transport::smtp::response::{Code, Severity},
    BoxError,
};

/// The Errors that may occur when sending an email over SMTP
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    pub(crate) fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// Returns true if the error is from response
    pub fn is_response(&self) -> bool {
        matches!(self.inner.kind, Kind::Response)
    }

    /// Returns true if the error is from client
    pub fn is_client(&self) -> bool {
        matches!(self.inner.kind, Kind::Client)
    }

    /// Returns true if the error is a transient SMTP error
    pub fn is_transient(&self) -> bool {
        matches!(self.inner.kind, Kind::Transient(_))
    }

    /// Returns true if the error is a permanent SMTP error
    pub fn is_permanent(&self) -> bool {
        matches!(self.inner.kind, Kind::Permanent(_))
    }

    /// Returns true if the server closed the connection
    ///
    /// This is the condition under which a `MAIL` command is retried on a
    /// new connection.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::Closed)
    }

    /// Returns true if no acceptable authentication could be performed
    pub fn is_auth(&self) -> bool {
        matches!(self.inner.kind, Kind::Auth)
    }

    /// Returns true if the error is caused by a timeout
    pub fn is_timeout(&self) -> bool {
        let mut source = self.source();

        while let Some(err) = source {
            if let Some(io_err) = err.downcast_ref::<io::Error>() {
                return io_err.kind() == io::ErrorKind::TimedOut;
            }

            source = err.source();
        }

        false
    }

    /// Returns true if the error is from TLS
    pub fn is_tls(&self) -> bool {
        matches!(self.inner.kind, Kind::Tls)
    }

    /// Returns the status code, if the error was generated from a response.
    pub fn status(&self) -> Option<Code> {
        match self.inner.kind {
            Kind::Transient(code) | Kind::Permanent(code) => Some(code),
            _ => None,
        }
    }

    /// 1-based position of the failing message when sending a batch
    pub fn message_index(&self) -> Option<usize> {
        match self.inner.kind {
            Kind::Send(index) => Some(index),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    /// Transient SMTP error, 4xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Transient(Code),
    /// Permanent SMTP error, 5xx reply code
    ///
    /// [RFC 5321, section 4.2.1](https://tools.ietf.org/html/rfc5321#section-4.2.1)
    Permanent(Code),
    /// Error parsing a response
    Response,
    /// Internal client error
    Client,
    /// Connection error
    Connection,
    /// The server closed the connection
    Closed,
    /// Underlying network i/o error
    Network,
    /// TLS error
    Tls,
    /// Authentication failure on the client side
    Auth,
    /// A message of a batch failed
    Send(usize),
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("mailwright::transport::smtp::Error");

        builder.field("kind", &self.inner.kind);

        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }

        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.kind {
            Kind::Response => f.write_str("response error")?,
            Kind::Client => f.write_str("internal client error")?,
            Kind::Network => f.write_str("network error")?,
            Kind::Connection => f.write_str("Connection error")?,
            Kind::Closed => f.write_str("connection closed by server")?,
            Kind::Tls => f.write_str("tls error")?,
            Kind::Auth => f.write_str("authentication error")?,
            Kind::Send(index) => write!(f, "could not send email {index}")?,
            Kind::Transient(ref code) => {
                write!(f, "transient error ({code})")?;
            }
            Kind::Permanent(ref code) => {
                write!(f, "permanent error ({code})")?;
            }
        };

        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }

        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| {
            let r: &(dyn std::error::Error + 'static) = &**e;
            r
        })
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Error::new(Kind::Closed, Some(err)),
            _ => network(err),
        }
    }
}

pub(crate) fn code(c: Code, s: Option<String>) -> Error {
    match c.severity {
        Severity::TransientNegativeCompletion => Error::new(Kind::Transient(c), s),
        Severity::PermanentNegativeCompletion => Error::new(Kind::Permanent(c), s),
        _ => client("Unknown error code"),
    }
}

pub(crate) fn response<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Response, Some(e))
}

pub(crate) fn client<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Client, Some(e))
}

pub(crate) fn network<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Network, Some(e))
}

pub(crate) fn connection<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Connection, Some(e))
}

pub(crate) fn closed() -> Error {
    Error::new(Kind::Closed, None::<BoxError>)
}

pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Tls, Some(e))
}

pub(crate) fn auth<E: Into<BoxError>>(e: E) -> Error {
    Error::new(Kind::Auth, Some(e))
}

pub(crate) fn send(index: usize, e: BoxError) -> Error {
    Error::new(Kind::Send(index), Some(e))
}

#[cfg(test)]
mod test {
    use std::io;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::smtp::response::{Category, Detail};

    #[test]
    fn code_severity() {
        let transient = code(
            Code::new(
                Severity::TransientNegativeCompletion,
                Category::MailSystem,
                Detail::One,
            ),
            Some("mailbox busy".to_owned()),
        );
        assert!(transient.is_transient());
        assert_eq!(transient.status().map(u16::from), Some(451));
        assert_eq!(transient.to_string(), "transient error (451): mailbox busy");

        let permanent = code(
            Code::new(
                Severity::PermanentNegativeCompletion,
                Category::MailSystem,
                Detail::Zero,
            ),
            None,
        );
        assert!(permanent.is_permanent());
        assert_eq!(permanent.to_string(), "permanent error (550)");

        let positive = code(
            Code::new(
                Severity::PositiveCompletion,
                Category::MailSystem,
                Detail::Zero,
            ),
            None,
        );
        assert!(positive.is_client());
    }

    #[test]
    fn io_errors() {
        let eof: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(eof.is_closed());
        let reset: Error = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(reset.is_closed());

        let timeout: Error = io::Error::new(io::ErrorKind::TimedOut, "too slow").into();
        assert!(!timeout.is_closed());
        assert!(timeout.is_timeout());
        assert_eq!(timeout.to_string(), "network error: too slow");
    }

    #[test]
    fn send_index() {
        let err = send(3, Box::new(closed()));
        assert_eq!(err.message_index(), Some(3));
        assert_eq!(
            err.to_string(),
            "could not send email 3: connection closed by server"
        );
        assert_eq!(closed().message_index(), None);
    }
}
