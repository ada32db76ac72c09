//! SASL authentication mechanisms
//!
//! An [`Authenticator`] drives one challenge/response exchange. The SMTP
//! client calls [`Authenticator::start`] with what it knows about the
//! server, sends `AUTH <mechanism> [initial response]`, then feeds every
//! decoded `334` challenge to [`Authenticator::next`] until the server
//! accepts or rejects the credentials.
//!
//! Which mechanism to use is decided by the [`Dialer`](super::Dialer), from
//! the mechanisms the server advertises and the security of the channel.

use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::transport::smtp::error::{self, Error};

/// Contains user credentials
#[derive(PartialEq, Eq, Clone, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credentials {
    authentication_identity: String,
    secret: String,
}

impl Credentials {
    /// Create a `Credentials` struct from username and password
    pub fn new(username: String, password: String) -> Credentials {
        Credentials {
            authentication_identity: username,
            secret: password,
        }
    }

    /// The user name
    pub fn username(&self) -> &str {
        &self.authentication_identity
    }
}

impl<S, T> From<(S, T)> for Credentials
where
    S: Into<String>,
    T: Into<String>,
{
    fn from((username, password): (S, T)) -> Self {
        Credentials::new(username.into(), password.into())
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.authentication_identity)
            .finish_non_exhaustive()
    }
}

/// Represents authentication mechanisms
#[derive(PartialEq, Eq, Copy, Clone, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mechanism {
    /// PLAIN authentication mechanism, defined in
    /// [RFC 4616](https://tools.ietf.org/html/rfc4616)
    Plain,
    /// LOGIN authentication mechanism
    /// Obsolete but needed for some providers (like office365)
    ///
    /// Defined in [draft-murchison-sasl-login-00](https://www.ietf.org/archive/id/draft-murchison-sasl-login-00.txt).
    Login,
    /// CRAM-MD5 authentication mechanism, defined in
    /// [RFC 2195](https://tools.ietf.org/html/rfc2195)
    CramMd5,
    /// Non-standard XOAUTH2 mechanism, defined in
    /// [xoauth2-protocol](https://developers.google.com/gmail/imap/xoauth2-protocol)
    Xoauth2,
}

impl Display for Mechanism {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Mechanism::Plain => "PLAIN",
            Mechanism::Login => "LOGIN",
            Mechanism::CramMd5 => "CRAM-MD5",
            Mechanism::Xoauth2 => "XOAUTH2",
        })
    }
}

impl FromStr for Mechanism {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Ok(Mechanism::Plain),
            "LOGIN" => Ok(Mechanism::Login),
            "CRAM-MD5" => Ok(Mechanism::CramMd5),
            "XOAUTH2" => Ok(Mechanism::Xoauth2),
            _ => Err(error::client(format!("unknown mechanism {s:?}"))),
        }
    }
}

impl Mechanism {
    /// Builds the authenticator implementing this mechanism
    ///
    /// `host` is the server the credentials are meant for, mechanisms that
    /// check the server identity compare it with the connected server.
    pub fn authenticator(self, credentials: Credentials, host: &str) -> Box<dyn Authenticator> {
        match self {
            Mechanism::Plain => Box::new(PlainAuth::new(credentials, host)),
            Mechanism::Login => Box::new(LoginAuth::new(credentials, host)),
            Mechanism::CramMd5 => Box::new(CramMd5Auth::new(credentials)),
            Mechanism::Xoauth2 => Box::new(Xoauth2Auth::new(credentials)),
        }
    }
}

/// What an authenticator may know about the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerContext {
    /// Host name the client connected to
    pub name: String,
    /// Whether the channel is encrypted
    pub tls: bool,
    /// Mechanisms listed by the `AUTH` keyword
    pub auth: Vec<String>,
}

impl ServerContext {
    fn advertises(&self, mechanism: Mechanism) -> bool {
        let name = mechanism.to_string();
        self.auth.iter().any(|m| m.eq_ignore_ascii_case(&name))
    }
}

/// A SASL challenge/response exchange
pub trait Authenticator: Send {
    /// Begins the exchange
    ///
    /// Returns the mechanism name sent with `AUTH`, and an optional initial
    /// response.
    fn start(&mut self, server: &ServerContext) -> Result<(String, Option<Vec<u8>>), Error>;

    /// Answers a server message
    ///
    /// `more` is true for a `334` challenge and false for the final success
    /// reply. Returning `None` ends the exchange.
    fn next(&mut self, challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>, Error>;
}

impl<A: Authenticator + ?Sized> Authenticator for Box<A> {
    fn start(&mut self, server: &ServerContext) -> Result<(String, Option<Vec<u8>>), Error> {
        (**self).start(server)
    }

    fn next(&mut self, challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>, Error> {
        (**self).next(challenge, more)
    }
}

fn check_host(server: &ServerContext, host: &str) -> Result<(), Error> {
    if server.name == host {
        Ok(())
    } else {
        Err(error::auth("wrong host name"))
    }
}

fn unexpected_challenge(challenge: &[u8]) -> Error {
    error::auth(format!(
        "unexpected server challenge: {}",
        String::from_utf8_lossy(challenge)
    ))
}

/// `PLAIN` mechanism
///
/// Refuses to send the password over an unencrypted channel, unless the
/// server is the local host.
#[derive(Debug, Clone)]
pub struct PlainAuth {
    credentials: Credentials,
    host: String,
}

impl PlainAuth {
    /// Creates the authenticator for `host`
    pub fn new(credentials: Credentials, host: &str) -> Self {
        Self {
            credentials,
            host: host.to_owned(),
        }
    }
}

fn is_localhost(name: &str) -> bool {
    matches!(name, "localhost" | "127.0.0.1" | "::1")
}

impl Authenticator for PlainAuth {
    fn start(&mut self, server: &ServerContext) -> Result<(String, Option<Vec<u8>>), Error> {
        if !server.tls && !is_localhost(&server.name) {
            return Err(error::auth("unencrypted connection"));
        }
        check_host(server, &self.host)?;

        let response = format!(
            "\u{0}{}\u{0}{}",
            self.credentials.authentication_identity, self.credentials.secret
        );
        Ok((Mechanism::Plain.to_string(), Some(response.into_bytes())))
    }

    fn next(&mut self, challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>, Error> {
        if more {
            Err(unexpected_challenge(challenge))
        } else {
            Ok(None)
        }
    }
}

/// `LOGIN` mechanism
///
/// On a plaintext channel it is only used if the server advertises it. The
/// server must be the host the credentials were configured for.
#[derive(Debug, Clone)]
pub struct LoginAuth {
    credentials: Credentials,
    host: String,
}

impl LoginAuth {
    /// Creates the authenticator for `host`
    pub fn new(credentials: Credentials, host: &str) -> Self {
        Self {
            credentials,
            host: host.to_owned(),
        }
    }
}

impl Authenticator for LoginAuth {
    fn start(&mut self, server: &ServerContext) -> Result<(String, Option<Vec<u8>>), Error> {
        if !server.tls && !server.advertises(Mechanism::Login) {
            return Err(error::auth("unencrypted connection"));
        }
        check_host(server, &self.host)?;
        Ok((Mechanism::Login.to_string(), None))
    }

    fn next(&mut self, challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>, Error> {
        if !more {
            return Ok(None);
        }

        match challenge {
            b"Username:" => Ok(Some(
                self.credentials.authentication_identity.as_bytes().to_vec(),
            )),
            b"Password:" => Ok(Some(self.credentials.secret.as_bytes().to_vec())),
            _ => Err(unexpected_challenge(challenge)),
        }
    }
}

/// `CRAM-MD5` mechanism
///
/// Answers the challenge with the HMAC-MD5 of it keyed by the password.
#[derive(Debug, Clone)]
pub struct CramMd5Auth {
    credentials: Credentials,
}

impl CramMd5Auth {
    /// Creates the authenticator
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Authenticator for CramMd5Auth {
    fn start(&mut self, _server: &ServerContext) -> Result<(String, Option<Vec<u8>>), Error> {
        Ok((Mechanism::CramMd5.to_string(), None))
    }

    fn next(&mut self, challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>, Error> {
        if !more {
            return Ok(None);
        }

        let mut mac = Hmac::<Md5>::new_from_slice(self.credentials.secret.as_bytes())
            .map_err(|_| error::client("invalid CRAM-MD5 key"))?;
        mac.update(challenge);
        let digest = hex::encode(mac.finalize().into_bytes());

        Ok(Some(
            format!("{} {}", self.credentials.authentication_identity, digest).into_bytes(),
        ))
    }
}

/// `XOAUTH2` mechanism, the password being the OAuth2 access token
#[derive(Debug, Clone)]
pub struct Xoauth2Auth {
    credentials: Credentials,
}

impl Xoauth2Auth {
    /// Creates the authenticator
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

impl Authenticator for Xoauth2Auth {
    fn start(&mut self, _server: &ServerContext) -> Result<(String, Option<Vec<u8>>), Error> {
        let response = format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.credentials.authentication_identity, self.credentials.secret
        );
        Ok((Mechanism::Xoauth2.to_string(), Some(response.into_bytes())))
    }

    fn next(&mut self, _challenge: &[u8], more: bool) -> Result<Option<Vec<u8>>, Error> {
        // an error challenge is acknowledged with an empty line to get the final reply
        Ok(more.then(Vec::new))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    const HOST: &str = "smtp.example.com";

    fn server(tls: bool, auth: &[&str]) -> ServerContext {
        ServerContext {
            name: HOST.to_owned(),
            tls,
            auth: auth.iter().map(|m| (*m).to_owned()).collect(),
        }
    }

    fn login() -> LoginAuth {
        LoginAuth::new(Credentials::from(("user", "pwd")), HOST)
    }

    /// Runs the exchange and collects what would be sent to the server
    fn exchange(
        auth: &mut dyn Authenticator,
        server: &ServerContext,
        challenges: &[&str],
    ) -> Result<Vec<String>, Error> {
        let (mechanism, initial) = auth.start(server)?;
        assert_eq!(mechanism, "LOGIN");
        let mut sent = vec![String::from_utf8(initial.unwrap_or_default()).unwrap()];
        for challenge in challenges {
            let response = auth.next(challenge.as_bytes(), true)?.unwrap();
            sent.push(String::from_utf8(response).unwrap());
        }
        Ok(sent)
    }

    #[test]
    fn login_not_advertised_on_plaintext() {
        let err = exchange(&mut login(), &server(false, &[]), &[]).unwrap_err();
        assert!(err.is_auth());
        assert_eq!(err.to_string(), "authentication error: unencrypted connection");
    }

    #[test]
    fn login_not_advertised_on_tls() {
        assert_eq!(
            exchange(&mut login(), &server(true, &[]), &["Username:", "Password:"]).unwrap(),
            vec!["", "user", "pwd"]
        );
    }

    #[test]
    fn login_advertised_on_plaintext() {
        assert_eq!(
            exchange(
                &mut login(),
                &server(false, &["PLAIN", "LOGIN"]),
                &["Username:", "Password:"]
            )
            .unwrap(),
            vec!["", "user", "pwd"]
        );
    }

    #[test]
    fn login_advertised_on_tls() {
        assert_eq!(
            exchange(&mut login(), &server(true, &["LOGIN"]), &["Username:", "Password:"])
                .unwrap(),
            vec!["", "user", "pwd"]
        );
    }

    #[test]
    fn login_wrong_host() {
        let mut other = server(true, &["LOGIN"]);
        other.name = "mx.example.org".to_owned();
        let err = login().start(&other).unwrap_err();
        assert_eq!(err.to_string(), "authentication error: wrong host name");
    }

    #[test]
    fn login_unexpected_challenge() {
        let mut auth = login();
        auth.start(&server(true, &["LOGIN"])).unwrap();
        let err = auth.next(b"Username", true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "authentication error: unexpected server challenge: Username"
        );
        assert_eq!(auth.next(b"2.7.0 Accepted", false).unwrap(), None);
    }

    #[test]
    fn plain() {
        let mut auth = PlainAuth::new(Credentials::from(("username", "password")), HOST);
        let (mechanism, initial) = auth.start(&server(true, &["PLAIN"])).unwrap();
        assert_eq!(mechanism, "PLAIN");
        assert_eq!(initial.unwrap(), b"\0username\0password");
        assert!(auth.next(b"test", true).is_err());
        assert_eq!(auth.next(b"", false).unwrap(), None);

        assert!(auth.start(&server(false, &["PLAIN"])).is_err());

        let mut local = PlainAuth::new(Credentials::from(("u", "p")), "localhost");
        let mut ctx = server(false, &["PLAIN"]);
        ctx.name = "localhost".to_owned();
        assert!(local.start(&ctx).is_ok());
    }

    #[test]
    fn cram_md5() {
        let mut auth = CramMd5Auth::new(Credentials::from(("alice", "wonderland")));
        let (mechanism, initial) = auth.start(&server(false, &["CRAM-MD5"])).unwrap();
        assert_eq!(mechanism, "CRAM-MD5");
        assert_eq!(initial, None);
        assert_eq!(
            auth.next(b"PDE3ODkzLjEzMjA2NzkxMjNAdGVzc2VyYWN0LnN1c2FtLmluPg==", true)
                .unwrap()
                .unwrap(),
            b"alice a540ebe4ef2304070bbc3c456c1f64c0"
        );
    }

    #[test]
    fn xoauth2() {
        let mut auth = Xoauth2Auth::new(Credentials::from((
            "username",
            "vF9dft4qmTc2Nvb3RlckBhdHRhdmlzdGEuY29tCg==",
        )));
        let (mechanism, initial) = auth.start(&server(true, &["XOAUTH2"])).unwrap();
        assert_eq!(mechanism, "XOAUTH2");
        assert_eq!(
            initial.unwrap(),
            b"user=username\x01auth=Bearer vF9dft4qmTc2Nvb3RlckBhdHRhdmlzdGEuY29tCg==\x01\x01"
        );
        assert_eq!(auth.next(b"{\"status\":\"400\"}", true).unwrap(), Some(vec![]));
    }

    #[test]
    fn mechanism_names() {
        assert_eq!("cram-md5".parse::<Mechanism>().unwrap(), Mechanism::CramMd5);
        assert_eq!(Mechanism::Xoauth2.to_string(), "XOAUTH2");
        assert!("GSSAPI".parse::<Mechanism>().is_err());
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let credentials = Credentials::from(("alice", "wonderland"));
        assert_eq!(
            format!("{credentials:?}"),
            "Credentials { username: \"alice\", .. }"
        );
    }
}
