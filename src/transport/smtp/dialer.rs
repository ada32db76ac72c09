use std::{
    fmt::{self, Debug},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use super::{
    authentication::{Authenticator, Credentials, Mechanism},
    client::{default_parameters, Connector, SmtpClient, TcpConnector, TlsParameters},
    error::{self, Error},
    SUBMISSIONS_PORT,
};
use crate::{
    transport::{self, SendCloser, Sender, WriteTo},
    Address, Message,
};

/// Default timeout for connecting and for every read and write
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

type SharedAuthenticator = Arc<Mutex<Box<dyn Authenticator>>>;

/// Dials an SMTP server and drives the session
///
/// A dialer holds the connection settings only. Every call to
/// [`Dialer::dial`] opens a new connection.
#[derive(Clone)]
pub struct Dialer {
    host: String,
    port: u16,
    ssl: bool,
    local_name: Option<String>,
    credentials: Option<Credentials>,
    mechanisms: Option<Vec<Mechanism>>,
    authenticator: Option<SharedAuthenticator>,
    tls_parameters: Option<TlsParameters>,
    timeout: Option<Duration>,
}

impl Debug for Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("local_name", &self.local_name)
            .field("credentials", &self.credentials)
            .field("mechanisms", &self.mechanisms)
            .field("authenticator", &self.authenticator.is_some())
            .field("tls_parameters", &self.tls_parameters)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Dialer {
    /// Creates a dialer authenticating with `username` and `password`
    ///
    /// Port 465 is dialled with implicit TLS.
    pub fn new<H, U, P>(host: H, port: u16, username: U, password: P) -> Dialer
    where
        H: Into<String>,
        U: Into<String>,
        P: Into<String>,
    {
        Dialer::builder(host)
            .port(port)
            .credentials(Credentials::new(username.into(), password.into()))
            .build()
    }

    /// Creates a builder for a dialer connecting to `host`
    pub fn builder<H: Into<String>>(host: H) -> DialerBuilder {
        DialerBuilder::new(host)
    }

    /// The server host name
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the connection is TLS from the start
    pub fn ssl(&self) -> bool {
        self.ssl
    }

    /// Opens a session, upgrades it to TLS and authenticates
    pub fn dial(&self) -> Result<SmtpSender<'_, TcpConnector>, Error> {
        self.dial_with(TcpConnector)
    }

    /// Same as [`Dialer::dial`], connecting with `connector`
    pub fn dial_with<C: Connector>(&self, connector: C) -> Result<SmtpSender<'_, C>, Error> {
        let client = self.open(&connector)?;
        Ok(SmtpSender {
            dialer: self,
            connector,
            client,
        })
    }

    /// Opens a session, sends the messages and closes it
    ///
    /// Stops at the first message that could not be sent. The session is
    /// closed either way.
    pub fn dial_and_send(&self, messages: &[Message]) -> Result<(), Error> {
        self.dial_and_send_with(TcpConnector, messages)
    }

    /// Same as [`Dialer::dial_and_send`], connecting with `connector`
    pub fn dial_and_send_with<C: Connector>(
        &self,
        connector: C,
        messages: &[Message],
    ) -> Result<(), Error> {
        let mut sender = self.dial_with(connector)?;
        let result = transport::send(&mut sender, messages)
            .map_err(|err| error::send(err.index(), err.into_source()));

        if let Err(err) = sender.close() {
            #[cfg(feature = "tracing")]
            tracing::debug!("could not close the session: {}", err);
            #[cfg(not(feature = "tracing"))]
            let _ = err;
        }
        result
    }

    fn tls_parameters(&self) -> Result<TlsParameters, Error> {
        match self.tls_parameters {
            Some(ref tls_parameters) => Ok(tls_parameters.clone()),
            None => default_parameters(&self.host),
        }
    }

    /// Connects and prepares a session for sending
    fn open<C: Connector>(&self, connector: &C) -> Result<C::Client, Error> {
        let wrapper = if self.ssl {
            Some(self.tls_parameters()?)
        } else {
            None
        };
        let mut client = connector.connect(&self.host, self.port, self.timeout, wrapper.as_ref())?;

        if let Some(ref local_name) = self.local_name {
            client.hello(local_name)?;
        }

        let mut encrypted = self.ssl;
        if !self.ssl && client.extension("STARTTLS")?.is_some() {
            client.start_tls(&self.tls_parameters()?)?;
            encrypted = true;
        }

        if let Some(ref authenticator) = self.authenticator {
            let mut authenticator = authenticator.lock().unwrap_or_else(PoisonError::into_inner);
            client.auth(&mut **authenticator)?;
        } else if let Some(ref credentials) = self.credentials {
            let advertised = client.extension("AUTH")?;
            let mechanism = self.select_mechanism(advertised.as_deref(), encrypted)?;
            #[cfg(feature = "tracing")]
            tracing::debug!("selected {} authentication", mechanism);
            let mut authenticator = mechanism.authenticator(credentials.clone(), &self.host);
            client.auth(&mut *authenticator)?;
        }

        Ok(client)
    }

    /// Picks a mechanism from the parameters of the `AUTH` extension
    fn select_mechanism(&self, advertised: Option<&str>, encrypted: bool) -> Result<Mechanism, Error> {
        let Some(advertised) = advertised else {
            // a TLS channel may carry LOGIN unannounced
            return if encrypted {
                Ok(Mechanism::Login)
            } else {
                Err(error::auth("no compatible authentication mechanism"))
            };
        };

        let offered: Vec<Mechanism> = advertised
            .split_whitespace()
            .filter_map(|name| name.parse().ok())
            .collect();

        if let Some(ref mechanisms) = self.mechanisms {
            return mechanisms
                .iter()
                .copied()
                .find(|mechanism| offered.contains(mechanism))
                .ok_or_else(|| error::auth("no compatible authentication mechanism"));
        }

        Ok(if offered.contains(&Mechanism::CramMd5) {
            Mechanism::CramMd5
        } else if offered.contains(&Mechanism::Login) && !offered.contains(&Mechanism::Plain) {
            Mechanism::Login
        } else {
            Mechanism::Plain
        })
    }
}

/// Builder for a [`Dialer`]
#[derive(Clone, Debug)]
pub struct DialerBuilder {
    dialer: Dialer,
    ssl: Option<bool>,
}

impl DialerBuilder {
    /// Starts from port 587 with a 10 second timeout
    pub fn new<H: Into<String>>(host: H) -> Self {
        DialerBuilder {
            dialer: Dialer {
                host: host.into(),
                port: super::SUBMISSION_PORT,
                ssl: false,
                local_name: None,
                credentials: None,
                mechanisms: None,
                authenticator: None,
                tls_parameters: None,
                timeout: Some(DEFAULT_TIMEOUT),
            },
            ssl: None,
        }
    }

    /// Set the port to use
    pub fn port(mut self, port: u16) -> Self {
        self.dialer.port = port;
        self
    }

    /// Forces implicit TLS on or off
    ///
    /// By default implicit TLS is used on port 465 only.
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = Some(ssl);
        self
    }

    /// Name to send in `EHLO`
    pub fn local_name<S: Into<String>>(mut self, local_name: S) -> Self {
        self.dialer.local_name = Some(local_name.into());
        self
    }

    /// Set the authentication credentials to use
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.dialer.credentials = Some(credentials);
        self
    }

    /// Restricts automatic selection to these mechanisms, in preference order
    pub fn mechanisms(mut self, mechanisms: Vec<Mechanism>) -> Self {
        self.dialer.mechanisms = Some(mechanisms);
        self
    }

    /// Authenticates with a custom authenticator instead of the credentials
    pub fn authenticator<A: Authenticator + 'static>(mut self, authenticator: A) -> Self {
        self.dialer.authenticator = Some(Arc::new(Mutex::new(Box::new(authenticator))));
        self
    }

    /// TLS settings for implicit TLS and `STARTTLS`
    ///
    /// Defaults to the platform roots, checking the certificate against the
    /// host name.
    pub fn tls_parameters(mut self, tls_parameters: TlsParameters) -> Self {
        self.dialer.tls_parameters = Some(tls_parameters);
        self
    }

    /// Set the timeout duration
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dialer.timeout = timeout;
        self
    }

    /// Build the dialer
    pub fn build(self) -> Dialer {
        let mut dialer = self.dialer;
        dialer.ssl = self.ssl.unwrap_or(dialer.port == SUBMISSIONS_PORT);
        dialer
    }
}

/// An open session, usable as a [`Sender`]
///
/// When the server drops the connection before `MAIL`, the session is
/// dialled again and the command retried once.
pub struct SmtpSender<'a, C: Connector> {
    dialer: &'a Dialer,
    connector: C,
    client: C::Client,
}

impl<C: Connector> Debug for SmtpSender<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSender")
            .field("dialer", self.dialer)
            .finish_non_exhaustive()
    }
}

impl<C: Connector> SmtpSender<'_, C> {
    /// The session client
    pub fn client(&mut self) -> &mut C::Client {
        &mut self.client
    }

    fn mail(&mut self, from: &Address) -> Result<(), Error> {
        match self.client.mail(from) {
            Err(err) if err.is_closed() => {
                #[cfg(feature = "tracing")]
                tracing::debug!("connection lost before MAIL, dialling {} again", self.dialer.host);
                self.client = self.dialer.open(&self.connector)?;
                self.client.mail(from)
            }
            result => result,
        }
    }

    fn transaction(&mut self, to: &[Address], message: &dyn WriteTo) -> Result<(), Error> {
        for recipient in to {
            self.client.rcpt(recipient)?;
        }

        let mut writer = self.client.data()?;
        message.write_to(&mut writer)?;
        writer.close()
    }
}

impl<C: Connector> Sender for SmtpSender<'_, C> {
    type Error = Error;

    fn send(&mut self, from: &Address, to: &[Address], message: &dyn WriteTo) -> Result<(), Error> {
        self.mail(from)?;

        if let Err(err) = self.transaction(to, message) {
            #[cfg(feature = "tracing")]
            tracing::debug!("transaction failed, resetting: {}", err);
            let _ = self.client.reset();
            return Err(err);
        }
        Ok(())
    }
}

impl<C: Connector> SendCloser for SmtpSender<'_, C> {
    /// Sends `QUIT` and closes the connection, even when `QUIT` fails
    fn close(&mut self) -> Result<(), Error> {
        let quit = self.client.quit();
        let close = self.client.close();
        quit.and(close)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn implicit_tls_on_465() {
        let dialer = Dialer::new("smtp.example.com", 465, "user", "pwd");
        assert!(dialer.ssl());
        let dialer = Dialer::new("smtp.example.com", 587, "user", "pwd");
        assert!(!dialer.ssl());
        let dialer = Dialer::builder("smtp.example.com")
            .port(2465)
            .ssl(true)
            .build();
        assert!(dialer.ssl());
        assert_eq!(dialer.port(), 2465);
    }

    #[test]
    fn builder_defaults() {
        let dialer = Dialer::builder("smtp.example.com").build();
        assert_eq!(dialer.host(), "smtp.example.com");
        assert_eq!(dialer.port(), 587);
        assert_eq!(dialer.timeout, Some(DEFAULT_TIMEOUT));
        assert!(dialer.credentials.is_none());
        assert!(dialer.local_name.is_none());
    }

    #[test]
    fn mechanism_selection() {
        let dialer = Dialer::new("smtp.example.com", 587, "user", "pwd");
        let select = |advertised, encrypted| dialer.select_mechanism(advertised, encrypted);

        assert_eq!(select(Some(""), false).unwrap(), Mechanism::Plain);
        assert_eq!(select(Some("PLAIN LOGIN"), false).unwrap(), Mechanism::Plain);
        assert_eq!(select(Some("LOGIN"), false).unwrap(), Mechanism::Login);
        assert_eq!(
            select(Some("PLAIN CRAM-MD5"), false).unwrap(),
            Mechanism::CramMd5
        );
        assert_eq!(select(None, true).unwrap(), Mechanism::Login);
        assert!(select(None, false).unwrap_err().is_auth());
    }

    #[test]
    fn explicit_mechanisms() {
        let dialer = Dialer::builder("smtp.example.com")
            .mechanisms(vec![Mechanism::Xoauth2, Mechanism::Login])
            .build();

        assert_eq!(
            dialer.select_mechanism(Some("PLAIN LOGIN"), true).unwrap(),
            Mechanism::Login
        );
        assert!(dialer
            .select_mechanism(Some("PLAIN"), true)
            .unwrap_err()
            .is_auth());
    }

    #[test]
    fn debug_hides_password() {
        let dialer = Dialer::new("smtp.example.com", 587, "user", "secret");
        let debug = format!("{dialer:?}");
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }
}
