//! SMTP client
//!
//! [`SmtpClient`] is the set of session operations the [`Dialer`] drives.
//! [`SmtpConnection`] implements it over a [`NetworkStream`]; tests can
//! implement it directly to observe the exact sequence of calls.
//!
//! [`Dialer`]: super::Dialer

use std::{io::Write, time::Duration};

pub use self::{
    connection::SmtpConnection,
    mock::MockStream,
    net::NetworkStream,
    tls::{Certificate, CertificateStore, TlsParameters, TlsParametersBuilder},
};
use crate::{
    transport::smtp::{authentication::Authenticator, error::Error},
    Address,
};

mod connection;
mod mock;
mod net;
mod tls;

pub(crate) use self::tls::default_parameters;

/// The operations of an SMTP session
pub trait SmtpClient {
    /// Sends `EHLO` (or `HELO`) with `local_name`
    ///
    /// Only allowed before any other command.
    fn hello(&mut self, local_name: &str) -> Result<(), Error>;

    /// Looks up an extension advertised by the server
    ///
    /// Returns its parameters, or `None` when it was not advertised.
    fn extension(&mut self, name: &str) -> Result<Option<String>, Error>;

    /// Upgrades the session with `STARTTLS`
    fn start_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error>;

    /// Authenticates with the given mechanism
    fn auth(&mut self, authenticator: &mut dyn Authenticator) -> Result<(), Error>;

    /// Starts a mail transaction
    fn mail(&mut self, from: &Address) -> Result<(), Error>;

    /// Adds a recipient to the current transaction
    fn rcpt(&mut self, to: &Address) -> Result<(), Error>;

    /// Sends `DATA` and returns a writer for the message
    fn data(&mut self) -> Result<Box<dyn DataWriter + '_>, Error>;

    /// Aborts the current transaction
    fn reset(&mut self) -> Result<(), Error>;

    /// Sends `QUIT`
    fn quit(&mut self) -> Result<(), Error>;

    /// Closes the underlying connection
    fn close(&mut self) -> Result<(), Error>;
}

/// Writer for the message content of a `DATA` command
pub trait DataWriter: Write {
    /// Ends the message and waits for the server to accept it
    fn close(self: Box<Self>) -> Result<(), Error>;
}

/// Opens client sessions
pub trait Connector {
    /// The session type
    type Client: SmtpClient;

    /// Connects to `host:port`, reading the server greeting
    ///
    /// With `tls_parameters` the channel is TLS from the start.
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<Self::Client, Error>;
}

/// Connects over TCP
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Client = SmtpConnection;

    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<SmtpConnection, Error> {
        SmtpConnection::connect(host, port, timeout, tls_parameters)
    }
}

/// State of a codec positioned right after a CRLF
const LINE_START: u8 = 2;

/// The codec used for transparency
///
/// Doubles dots at the start of lines and produces the end-of-data
/// terminator. The first byte of the payload counts as the start of a
/// line.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClientCodec {
    escape_count: u8,
}

impl Default for ClientCodec {
    fn default() -> Self {
        ClientCodec {
            escape_count: LINE_START,
        }
    }
}

impl ClientCodec {
    /// Creates a new client codec
    pub fn new() -> Self {
        ClientCodec::default()
    }

    /// Adds transparency
    ///
    /// An empty frame writes the terminator, completing the last line if
    /// needed.
    pub fn encode(&mut self, frame: &[u8], buf: &mut Vec<u8>) {
        if frame.is_empty() {
            match self.escape_count {
                1 => buf.extend_from_slice(b"\n.\r\n"),
                LINE_START => buf.extend_from_slice(b".\r\n"),
                _ => buf.extend_from_slice(b"\r\n.\r\n"),
            }
            self.escape_count = LINE_START;
            return;
        }

        let mut start = 0;
        for (idx, byte) in frame.iter().enumerate() {
            self.escape_count = match (self.escape_count, *byte) {
                (_, b'\r') => 1,
                (1, b'\n') => LINE_START,
                (LINE_START, b'.') => 3,
                _ => 0,
            };
            if self.escape_count == 3 {
                self.escape_count = 0;
                buf.extend_from_slice(&frame[start..idx]);
                buf.push(b'.');
                start = idx;
            }
        }
        buf.extend_from_slice(&frame[start..]);
    }
}

/// Returns the string replacing all the CRLF with "\<CRLF\>"
///
/// Used for debug displays
#[cfg(feature = "tracing")]
pub(super) fn escape_crlf(string: &str) -> String {
    string.replace("\r\n", "<CRLF>")
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_codec() {
        let mut codec = ClientCodec::new();
        let mut buf: Vec<u8> = vec![];

        codec.encode(b"test\r\n", &mut buf);
        codec.encode(b".\r\n", &mut buf);
        codec.encode(b"\r\ntest", &mut buf);
        codec.encode(b"te\r\n.\r\nst", &mut buf);
        codec.encode(b"test", &mut buf);
        codec.encode(b"test.", &mut buf);
        codec.encode(b"test\n", &mut buf);
        codec.encode(b".test\n", &mut buf);
        codec.encode(b"test", &mut buf);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "test\r\n..\r\n\r\ntestte\r\n..\r\nsttesttest.test\n.test\ntest"
        );
    }

    #[test]
    fn codec_leading_dot() {
        let mut buf = vec![];
        let mut codec = ClientCodec::new();
        codec.encode(b".\r\nRSET\r\n", &mut buf);
        codec.encode(&[], &mut buf);
        assert_eq!(buf, b"..\r\nRSET\r\n.\r\n");

        let mut buf = vec![];
        let mut codec = ClientCodec::new();
        codec.encode(&[], &mut buf);
        assert_eq!(buf, b".\r\n");
    }

    #[test]
    fn codec_terminator() {
        let mut buf = vec![];
        let mut codec = ClientCodec::new();
        codec.encode(b"body", &mut buf);
        codec.encode(&[], &mut buf);
        assert_eq!(buf, b"body\r\n.\r\n");

        let mut buf = vec![];
        let mut codec = ClientCodec::new();
        codec.encode(b"body\r\n", &mut buf);
        codec.encode(&[], &mut buf);
        assert_eq!(buf, b"body\r\n.\r\n");

        let mut buf = vec![];
        let mut codec = ClientCodec::new();
        codec.encode(b"body\r", &mut buf);
        codec.encode(&[], &mut buf);
        assert_eq!(buf, b"body\r\n.\r\n");
    }

    #[test]
    #[cfg(feature = "tracing")]
    fn test_escape_crlf() {
        assert_eq!(escape_crlf("\r\n"), "<CRLF>");
        assert_eq!(escape_crlf("EHLO my_name\r\n"), "EHLO my_name<CRLF>");
        assert_eq!(
            escape_crlf("EHLO my_name\r\nSIZE 42\r\n"),
            "EHLO my_name<CRLF>SIZE 42<CRLF>"
        );
    }
}
