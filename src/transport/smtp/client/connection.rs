use std::{
    fmt::Display,
    io::{self, BufRead, BufReader, Write},
    net::Shutdown,
    time::Duration,
};

use base64::{engine::general_purpose::STANDARD, Engine};

#[cfg(feature = "tracing")]
use super::escape_crlf;
use super::{net::NetworkStream, tls::TlsParameters, ClientCodec, DataWriter, SmtpClient};
use crate::{
    transport::smtp::{
        authentication::{Authenticator, ServerContext},
        commands::*,
        error::{self, Error},
        extension::{ClientId, Extension, MailBodyParameter, MailParameter, ServerInfo},
        response::{parse_response, Response},
    },
    Address,
};

/// Upper bound on the number of challenges of one `AUTH` exchange
const MAX_CHALLENGES: usize = 10;

/// A blocking SMTP connection
///
/// The greeting is read on creation. `EHLO` is sent lazily before the first
/// command that needs it, falling back to `HELO` when the server rejects
/// it.
pub struct SmtpConnection {
    /// TCP stream between client and server
    stream: BufReader<NetworkStream>,
    /// Host name we connected to, checked by authenticators
    server_name: String,
    /// Name sent with `EHLO`
    local_name: ClientId,
    /// Information about the server
    server_info: ServerInfo,
    did_hello: bool,
}

impl SmtpConnection {
    /// Wraps an open stream and reads the server greeting
    pub fn new(stream: NetworkStream, server_name: &str) -> Result<SmtpConnection, Error> {
        let mut conn = SmtpConnection {
            stream: BufReader::new(stream),
            server_name: server_name.to_owned(),
            local_name: ClientId::default(),
            server_info: ServerInfo::default(),
            did_hello: false,
        };
        let greeting = conn.read_response()?;
        if !greeting.has_code(220) {
            return Err(error::response(format!(
                "unexpected greeting ({})",
                greeting.code()
            )));
        }
        Ok(conn)
    }

    /// Connects to `host:port`
    ///
    /// With `tls_parameters` the connection is wrapped in TLS right away.
    pub fn connect(
        host: &str,
        port: u16,
        timeout: Option<Duration>,
        tls_parameters: Option<&TlsParameters>,
    ) -> Result<SmtpConnection, Error> {
        let mut stream = NetworkStream::connect((host, port), timeout, tls_parameters)?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;
        SmtpConnection::new(stream, host)
    }

    /// What the server announced in its hello reply
    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Tells if the underlying stream is currently encrypted
    pub fn is_encrypted(&self) -> bool {
        self.stream.get_ref().is_encrypted()
    }

    fn ensure_hello(&mut self) -> Result<(), Error> {
        if self.did_hello {
            return Ok(());
        }
        self.ehlo_or_helo()?;
        self.did_hello = true;
        Ok(())
    }

    fn ehlo_or_helo(&mut self) -> Result<(), Error> {
        match self.command(Ehlo::new(self.local_name.clone())) {
            Ok(response) => {
                self.server_info = ServerInfo::from_response(&response)?;
            }
            Err(err) if err.is_permanent() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("EHLO rejected, falling back to HELO: {}", err);
                let response = self.command(Helo::new(self.local_name.clone()))?;
                self.server_info = ServerInfo::from_helo(&response)?;
            }
            Err(err) => return Err(err),
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("server {}", self.server_info);
        Ok(())
    }

    /// Sends an SMTP command
    pub fn command<C: Display>(&mut self, command: C) -> Result<Response, Error> {
        self.write(command.to_string().as_bytes())?;
        self.read_response()
    }

    /// Writes a string to the server
    fn write(&mut self, string: &[u8]) -> Result<(), Error> {
        self.stream.get_mut().write_all(string)?;
        self.stream.get_mut().flush()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Wrote: {}",
            escape_crlf(String::from_utf8_lossy(string).as_ref())
        );
        Ok(())
    }

    /// Gets the SMTP response
    ///
    /// Negative replies are turned into transient or permanent errors.
    pub fn read_response(&mut self) -> Result<Response, Error> {
        let mut buffer = String::with_capacity(100);

        while self.stream.read_line(&mut buffer)? > 0 {
            #[cfg(feature = "tracing")]
            tracing::debug!("<< {}", escape_crlf(&buffer));
            match parse_response(&buffer) {
                Ok((_remaining, response)) => {
                    return if response.is_positive() {
                        Ok(response)
                    } else {
                        Err(error::code(response.code(), Some(response.text())))
                    };
                }
                Err(nom::Err::Failure(e)) => {
                    return Err(error::response(e.to_string()));
                }
                Err(nom::Err::Incomplete(_)) => { /* read more */ }
                Err(nom::Err::Error(e)) => {
                    return Err(error::response(e.to_string()));
                }
            }
        }

        Err(error::closed())
    }

    fn mail_parameters(&self, from: &Address) -> Result<Vec<MailParameter>, Error> {
        let mut parameters = Vec::new();
        if self.server_info.supports_feature(Extension::EightBitMime) {
            parameters.push(MailParameter::Body(MailBodyParameter::EightBitMime));
        }
        if !from.is_ascii() {
            if !self.server_info.supports_feature(Extension::SmtpUtfEight) {
                return Err(error::client(
                    "the sender address is not ASCII and the server does not support SMTPUTF8",
                ));
            }
            parameters.push(MailParameter::SmtpUtfEight);
        }
        Ok(parameters)
    }
}

fn auth_step(
    authenticator: &mut dyn Authenticator,
    response: &Response,
) -> Result<Option<Vec<u8>>, Error> {
    if response.has_code(334) {
        let challenge = STANDARD
            .decode(response.first_line().unwrap_or_default().trim())
            .map_err(error::response)?;
        authenticator.next(&challenge, true)
    } else if response.has_code(235) {
        authenticator.next(response.text().as_bytes(), false)
    } else {
        Err(error::response(format!(
            "unexpected reply to AUTH ({})",
            response.code()
        )))
    }
}

impl SmtpClient for SmtpConnection {
    fn hello(&mut self, local_name: &str) -> Result<(), Error> {
        if self.did_hello {
            return Err(error::client(
                "hello must be called before any other command",
            ));
        }
        self.local_name = ClientId::from(local_name);
        self.ensure_hello()
    }

    fn extension(&mut self, name: &str) -> Result<Option<String>, Error> {
        self.ensure_hello()?;
        Ok(self.server_info.extension(name).map(str::to_owned))
    }

    fn start_tls(&mut self, tls_parameters: &TlsParameters) -> Result<(), Error> {
        self.ensure_hello()?;
        self.command(Starttls)?;
        self.stream.get_mut().upgrade_tls(tls_parameters)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("connection encrypted");
        // the server forgets everything it was told before the upgrade
        self.ehlo_or_helo()
    }

    fn auth(&mut self, authenticator: &mut dyn Authenticator) -> Result<(), Error> {
        self.ensure_hello()?;
        let context = ServerContext {
            name: self.server_name.clone(),
            tls: self.is_encrypted(),
            auth: self
                .server_info
                .auth_mechanisms()
                .into_iter()
                .map(str::to_owned)
                .collect(),
        };
        let (mechanism, initial) = authenticator.start(&context)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("authenticating with {}", mechanism);

        let mut response = self.command(Auth::new(mechanism, initial))?;
        for _ in 0..MAX_CHALLENGES {
            match auth_step(authenticator, &response) {
                Ok(None) => return Ok(()),
                Ok(Some(answer)) => response = self.command(AuthResponse::new(answer))?,
                Err(err) => {
                    let _ = self.command(AuthCancel);
                    return Err(err);
                }
            }
        }

        let _ = self.command(AuthCancel);
        Err(error::response("unexpected number of challenges"))
    }

    fn mail(&mut self, from: &Address) -> Result<(), Error> {
        self.ensure_hello()?;
        let parameters = self.mail_parameters(from)?;
        self.command(Mail::new(from.clone(), parameters))?;
        Ok(())
    }

    fn rcpt(&mut self, to: &Address) -> Result<(), Error> {
        self.command(Rcpt::new(to.clone()))?;
        Ok(())
    }

    fn data(&mut self) -> Result<Box<dyn DataWriter + '_>, Error> {
        let response = self.command(Data)?;
        if !response.has_code(354) {
            return Err(error::response(format!(
                "unexpected reply to DATA ({})",
                response.code()
            )));
        }
        Ok(Box::new(SmtpDataWriter {
            conn: self,
            codec: ClientCodec::new(),
        }))
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.ensure_hello()?;
        self.command(Rset)?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), Error> {
        self.ensure_hello()?;
        self.command(Quit)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        match self.stream.get_mut().shutdown(Shutdown::Both) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(error::network(err)),
            _ => Ok(()),
        }
    }
}

/// Streams the message body with dot-stuffing
struct SmtpDataWriter<'a> {
    conn: &'a mut SmtpConnection,
    codec: ClientCodec,
}

impl Write for SmtpDataWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // an empty frame is the terminator
        if buf.is_empty() {
            return Ok(0);
        }
        let mut out = Vec::with_capacity(buf.len() + 8);
        self.codec.encode(buf, &mut out);
        self.conn.stream.get_mut().write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.conn.stream.get_mut().flush()
    }
}

impl DataWriter for SmtpDataWriter<'_> {
    fn close(mut self: Box<Self>) -> Result<(), Error> {
        let mut terminator = Vec::with_capacity(5);
        self.codec.encode(&[], &mut terminator);
        self.conn.write(&terminator)?;
        self.conn.read_response()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::smtp::{authentication::LoginAuth, client::mock::MockStream};

    fn connection(replies: &str) -> (SmtpConnection, MockStream) {
        let mock = MockStream::with_vec(replies.as_bytes().to_vec());
        let handle = mock.clone();
        let conn = SmtpConnection::new(NetworkStream::mock(mock), "smtp.example.com").unwrap();
        (conn, handle)
    }

    fn written(handle: &mut MockStream) -> String {
        String::from_utf8(handle.take_vec()).unwrap()
    }

    #[test]
    fn lazy_ehlo() {
        let (mut conn, mut handle) = connection(concat!(
            "220 smtp.example.com ESMTP\r\n",
            "250-smtp.example.com hello\r\n",
            "250-8BITMIME\r\n",
            "250 SIZE 1000\r\n",
        ));
        assert_eq!(written(&mut handle), "");

        assert_eq!(conn.extension("size").unwrap(), Some("1000".to_owned()));
        assert_eq!(conn.extension("STARTTLS").unwrap(), None);
        assert_eq!(written(&mut handle), "EHLO localhost\r\n");
        assert!(conn.hello("late").is_err());
    }

    #[test]
    fn helo_fallback() {
        let (mut conn, mut handle) = connection(concat!(
            "220 old.example.com\r\n",
            "502 command not implemented\r\n",
            "250 old.example.com\r\n",
        ));
        conn.hello("client.example.org").unwrap();
        assert_eq!(
            written(&mut handle),
            "EHLO client.example.org\r\nHELO client.example.org\r\n"
        );
        assert_eq!(conn.server_info().name(), "old.example.com");
        assert_eq!(conn.extension("AUTH").unwrap(), None);
    }

    #[test]
    fn mail_parameters() {
        let (mut conn, mut handle) = connection(concat!(
            "220 smtp.example.com ESMTP\r\n",
            "250-smtp.example.com\r\n",
            "250 8BITMIME\r\n",
            "250 OK\r\n",
        ));
        conn.mail(&"from@example.com".parse().unwrap()).unwrap();
        assert_eq!(
            written(&mut handle),
            "EHLO localhost\r\nMAIL FROM:<from@example.com> BODY=8BITMIME\r\n"
        );

        let err = conn.mail(&"user@exämple.com".parse().unwrap()).unwrap_err();
        assert!(err.is_client());
    }

    #[test]
    fn negative_replies() {
        let (mut conn, _handle) = connection(concat!(
            "220 smtp.example.com ESMTP\r\n",
            "250 smtp.example.com\r\n",
            "550 5.1.1 no such user\r\n",
        ));
        let err = conn.mail(&"from@example.com".parse().unwrap()).unwrap_err();
        assert!(err.is_permanent());
        assert_eq!(err.status().map(u16::from), Some(550));

        // nothing left to read
        assert!(conn.rcpt(&"to@example.com".parse().unwrap()).unwrap_err().is_closed());
    }

    #[test]
    fn data_writer_stuffs_dots() {
        let (mut conn, mut handle) = connection(concat!(
            "220 smtp.example.com ESMTP\r\n",
            "354 go ahead\r\n",
            "250 queued\r\n",
        ));
        let mut writer = conn.data().unwrap();
        writer.write_all(b"Subject: dots\r\n\r\n.hidden\r\nend").unwrap();
        writer.close().unwrap();
        assert_eq!(
            written(&mut handle),
            "DATA\r\nSubject: dots\r\n\r\n..hidden\r\nend\r\n.\r\n"
        );
    }

    #[test]
    fn data_writer_stuffs_leading_dot() {
        let (mut conn, mut handle) = connection(concat!(
            "220 smtp.example.com ESMTP\r\n",
            "354 go ahead\r\n",
            "250 queued\r\n",
        ));
        let mut writer = conn.data().unwrap();
        writer.write_all(b".\r\nRSET\r\n").unwrap();
        assert_eq!(writer.write(&[]).unwrap(), 0);
        writer.close().unwrap();
        assert_eq!(written(&mut handle), "DATA\r\n..\r\nRSET\r\n.\r\n");
    }

    #[test]
    fn login_exchange() {
        let (mut conn, mut handle) = connection(concat!(
            "220 smtp.example.com ESMTP\r\n",
            "250-smtp.example.com\r\n",
            "250 AUTH LOGIN\r\n",
            "334 VXNlcm5hbWU6\r\n",
            "334 UGFzc3dvcmQ6\r\n",
            "235 2.7.0 accepted\r\n",
        ));
        let mut login = LoginAuth::new(("user", "pwd").into(), "smtp.example.com");
        conn.auth(&mut login).unwrap();
        assert_eq!(
            written(&mut handle),
            "EHLO localhost\r\nAUTH LOGIN\r\ndXNlcg==\r\ncHdk\r\n"
        );
    }

    #[test]
    fn cancelled_exchange() {
        let (mut conn, mut handle) = connection(concat!(
            "220 smtp.example.com ESMTP\r\n",
            "250-smtp.example.com\r\n",
            "250 AUTH LOGIN\r\n",
            "334 V2hvIGFyZSB5b3U/\r\n",
            "501 cancelled\r\n",
        ));
        let mut login = LoginAuth::new(("user", "pwd").into(), "smtp.example.com");
        assert!(conn.auth(&mut login).is_err());
        assert_eq!(
            written(&mut handle),
            "EHLO localhost\r\nAUTH LOGIN\r\n*\r\n"
        );
    }

    #[test]
    fn close_shuts_down_once() {
        let (mut conn, handle) = connection("220 smtp.example.com ESMTP\r\n");
        conn.close().unwrap();
        assert_eq!(handle.shutdown_count(), 1);
    }
}
