//! SMTP commands

use std::fmt::{self, Display, Formatter};

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    transport::smtp::extension::{ClientId, MailParameter},
    Address,
};

/// EHLO command
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ehlo {
    client_id: ClientId,
}

impl Display for Ehlo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        #[allow(clippy::write_with_newline)]
        write!(f, "EHLO {}\r\n", self.client_id)
    }
}

impl Ehlo {
    /// Creates a EHLO command
    pub fn new(client_id: ClientId) -> Ehlo {
        Ehlo { client_id }
    }
}

/// HELO command, used when the server does not understand EHLO
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Helo {
    client_id: ClientId,
}

impl Display for Helo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        #[allow(clippy::write_with_newline)]
        write!(f, "HELO {}\r\n", self.client_id)
    }
}

impl Helo {
    /// Creates a HELO command
    pub fn new(client_id: ClientId) -> Helo {
        Helo { client_id }
    }
}

/// STARTTLS command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Starttls;

impl Display for Starttls {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("STARTTLS\r\n")
    }
}

/// MAIL command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Mail {
    sender: Address,
    parameters: Vec<MailParameter>,
}

impl Display for Mail {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "MAIL FROM:<{}>", self.sender)?;
        for parameter in &self.parameters {
            write!(f, " {parameter}")?;
        }
        f.write_str("\r\n")
    }
}

impl Mail {
    /// Creates a MAIL command
    pub fn new(sender: Address, parameters: Vec<MailParameter>) -> Mail {
        Mail { sender, parameters }
    }
}

/// RCPT command
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Rcpt {
    recipient: Address,
}

impl Display for Rcpt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        #[allow(clippy::write_with_newline)]
        write!(f, "RCPT TO:<{}>\r\n", self.recipient)
    }
}

impl Rcpt {
    /// Creates an RCPT command
    pub fn new(recipient: Address) -> Rcpt {
        Rcpt { recipient }
    }
}

/// DATA command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Data;

impl Display for Data {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DATA\r\n")
    }
}

/// QUIT command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Quit;

impl Display for Quit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("QUIT\r\n")
    }
}

/// RSET command
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct Rset;

impl Display for Rset {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("RSET\r\n")
    }
}

/// AUTH command, with an optional initial response
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Auth {
    mechanism: String,
    response: Option<Vec<u8>>,
}

impl Display for Auth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AUTH {}", self.mechanism)?;
        match self.response {
            Some(ref response) if !response.is_empty() => {
                write!(f, " {}", STANDARD.encode(response))?;
            }
            _ => {}
        }
        f.write_str("\r\n")
    }
}

impl Auth {
    /// Creates an AUTH command
    pub fn new(mechanism: String, response: Option<Vec<u8>>) -> Auth {
        Auth {
            mechanism,
            response,
        }
    }
}

/// A line answering an authentication challenge
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct AuthResponse {
    response: Vec<u8>,
}

impl Display for AuthResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        #[allow(clippy::write_with_newline)]
        write!(f, "{}\r\n", STANDARD.encode(&self.response))
    }
}

impl AuthResponse {
    /// Creates the answer to a challenge
    pub fn new(response: Vec<u8>) -> AuthResponse {
        AuthResponse { response }
    }
}

/// Cancels an authentication exchange
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
pub struct AuthCancel;

impl Display for AuthCancel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("*\r\n")
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::smtp::extension::MailBodyParameter;

    #[test]
    fn display() {
        let id = ClientId::Domain("localhost".to_owned());
        let email = Address::from_str("test@example.com").unwrap();

        assert_eq!(Ehlo::new(id.clone()).to_string(), "EHLO localhost\r\n");
        assert_eq!(Helo::new(id).to_string(), "HELO localhost\r\n");
        assert_eq!(Starttls.to_string(), "STARTTLS\r\n");
        assert_eq!(
            Mail::new(email.clone(), vec![]).to_string(),
            "MAIL FROM:<test@example.com>\r\n"
        );
        assert_eq!(
            Mail::new(
                email.clone(),
                vec![
                    MailParameter::Body(MailBodyParameter::EightBitMime),
                    MailParameter::SmtpUtfEight,
                ],
            )
            .to_string(),
            "MAIL FROM:<test@example.com> BODY=8BITMIME SMTPUTF8\r\n"
        );
        assert_eq!(
            Rcpt::new(email).to_string(),
            "RCPT TO:<test@example.com>\r\n"
        );
        assert_eq!(Data.to_string(), "DATA\r\n");
        assert_eq!(Rset.to_string(), "RSET\r\n");
        assert_eq!(Quit.to_string(), "QUIT\r\n");
    }

    #[test]
    fn auth_display() {
        assert_eq!(
            Auth::new("PLAIN".to_owned(), Some(b"\0user\0password".to_vec())).to_string(),
            "AUTH PLAIN AHVzZXIAcGFzc3dvcmQ=\r\n"
        );
        assert_eq!(Auth::new("LOGIN".to_owned(), None).to_string(), "AUTH LOGIN\r\n");
        assert_eq!(
            Auth::new("LOGIN".to_owned(), Some(vec![])).to_string(),
            "AUTH LOGIN\r\n"
        );
        assert_eq!(AuthResponse::new(b"user".to_vec()).to_string(), "dXNlcg==\r\n");
        assert_eq!(AuthResponse::new(vec![]).to_string(), "\r\n");
        assert_eq!(AuthCancel.to_string(), "*\r\n");
    }
}
