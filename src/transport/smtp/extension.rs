//! ESMTP features

use std::{
    collections::{BTreeMap, HashSet},
    fmt::{self, Display, Formatter},
    net::{Ipv4Addr, Ipv6Addr},
};

use crate::transport::smtp::{
    authentication::Mechanism,
    error::{self, Error},
    response::Response,
};

/// Client identifier, the parameter to `EHLO`
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ClientId {
    /// A fully-qualified domain name
    Domain(String),
    /// An IPv4 address
    Ipv4(Ipv4Addr),
    /// An IPv6 address
    Ipv6(Ipv6Addr),
}

impl Default for ClientId {
    fn default() -> Self {
        Self::Domain("localhost".to_owned())
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Domain(ref value) => f.write_str(value),
            Self::Ipv4(ref value) => write!(f, "[{value}]"),
            Self::Ipv6(ref value) => write!(f, "[IPv6:{value}]"),
        }
    }
}

impl From<&str> for ClientId {
    fn from(name: &str) -> Self {
        Self::Domain(name.to_owned())
    }
}

/// ESMTP keywords the client acts upon
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum Extension {
    /// 8BITMIME keyword
    ///
    /// Defined in [RFC 6152](https://tools.ietf.org/html/rfc6152)
    EightBitMime,
    /// SMTPUTF8 keyword
    ///
    /// Defined in [RFC 6531](https://tools.ietf.org/html/rfc6531)
    SmtpUtfEight,
    /// STARTTLS keyword
    ///
    /// Defined in [RFC 2487](https://tools.ietf.org/html/rfc2487)
    StartTls,
    /// AUTH mechanism
    Authentication(Mechanism),
}

impl Display for Extension {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Extension::EightBitMime => f.write_str("8BITMIME"),
            Extension::SmtpUtfEight => f.write_str("SMTPUTF8"),
            Extension::StartTls => f.write_str("STARTTLS"),
            Extension::Authentication(ref mechanism) => write!(f, "AUTH {mechanism}"),
        }
    }
}

/// What the server announced in its `EHLO` (or `HELO`) reply
#[derive(Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServerInfo {
    /// The name given in the first line of the reply
    name: String,
    /// Known features, for typed checks
    features: HashSet<Extension>,
    /// Every advertised keyword, uppercased, with its parameters
    keywords: BTreeMap<String, String>,
}

impl Display for ServerInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.keywords.is_empty() {
            write!(f, "{} with no extensions", self.name)
        } else {
            let keywords: Vec<&str> = self.keywords.keys().map(String::as_str).collect();
            write!(f, "{} with {}", self.name, keywords.join(", "))
        }
    }
}

impl ServerInfo {
    /// Parses an `EHLO` reply
    ///
    /// The first line carries the server name, every following line is a
    /// keyword optionally followed by parameters.
    pub fn from_response(response: &Response) -> Result<ServerInfo, Error> {
        let mut info = ServerInfo::from_helo(response)?;

        for line in response.message().skip(1) {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (keyword, params) = match line.split_once(' ') {
                Some((keyword, params)) => (keyword, params.trim()),
                None => (line, ""),
            };
            let keyword = keyword.to_ascii_uppercase();

            match keyword.as_str() {
                "8BITMIME" => {
                    info.features.insert(Extension::EightBitMime);
                }
                "SMTPUTF8" => {
                    info.features.insert(Extension::SmtpUtfEight);
                }
                "STARTTLS" => {
                    info.features.insert(Extension::StartTls);
                }
                "AUTH" => {
                    for mechanism in params.split_whitespace() {
                        if let Ok(mechanism) = mechanism.parse::<Mechanism>() {
                            info.features.insert(Extension::Authentication(mechanism));
                        }
                    }
                }
                _ => (),
            }
            info.keywords.insert(keyword, params.to_owned());
        }

        Ok(info)
    }

    /// Server information from a `HELO` reply, which lists no extension
    pub(crate) fn from_helo(response: &Response) -> Result<ServerInfo, Error> {
        let name = response
            .first_word()
            .ok_or_else(|| error::response("Could not read server name"))?;
        Ok(ServerInfo {
            name: name.to_owned(),
            ..ServerInfo::default()
        })
    }

    /// Checks if the server supports an ESMTP feature
    pub fn supports_feature(&self, keyword: Extension) -> bool {
        self.features.contains(&keyword)
    }

    /// Checks if the server advertised an authentication mechanism
    pub fn supports_auth_mechanism(&self, mechanism: Mechanism) -> bool {
        self.features
            .contains(&Extension::Authentication(mechanism))
    }

    /// Looks up an advertised keyword, ignoring case
    ///
    /// Returns the parameters following the keyword, an empty string when
    /// there are none, or `None` when the keyword was not advertised.
    pub fn extension(&self, name: &str) -> Option<&str> {
        self.keywords
            .get(&name.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// The mechanisms listed by the `AUTH` keyword, as advertised
    pub fn auth_mechanisms(&self) -> Vec<&str> {
        self.extension("AUTH")
            .map(|params| params.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// The name given in the server banner
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }
}

/// A `MAIL FROM` extension parameter
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MailParameter {
    /// `BODY` parameter
    Body(MailBodyParameter),
    /// `SMTPUTF8` parameter
    SmtpUtfEight,
}

impl Display for MailParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            MailParameter::Body(ref value) => write!(f, "BODY={value}"),
            MailParameter::SmtpUtfEight => f.write_str("SMTPUTF8"),
        }
    }
}

/// Values for the `BODY` parameter to `MAIL FROM`
#[derive(PartialEq, Eq, Clone, Debug, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MailBodyParameter {
    /// `7BIT`
    SevenBit,
    /// `8BITMIME`
    EightBitMime,
}

impl Display for MailBodyParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            MailBodyParameter::SevenBit => f.write_str("7BIT"),
            MailBodyParameter::EightBitMime => f.write_str("8BITMIME"),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::transport::smtp::response::{Category, Code, Detail, Severity};

    fn ehlo(lines: &[&str]) -> Response {
        Response::new(
            Code::new(
                Severity::PositiveCompletion,
                Category::MailSystem,
                Detail::Zero,
            ),
            lines.iter().map(|l| (*l).to_owned()).collect(),
        )
    }

    #[test]
    fn client_id_fmt() {
        assert_eq!(ClientId::default().to_string(), "localhost");
        assert_eq!(ClientId::from("test").to_string(), "test");
        assert_eq!(
            ClientId::Ipv4(Ipv4Addr::new(127, 0, 0, 1)).to_string(),
            "[127.0.0.1]"
        );
        assert_eq!(
            ClientId::Ipv6(Ipv6Addr::LOCALHOST).to_string(),
            "[IPv6:::1]"
        );
    }

    #[test]
    fn extension_fmt() {
        assert_eq!(Extension::EightBitMime.to_string(), "8BITMIME");
        assert_eq!(
            Extension::Authentication(Mechanism::Login).to_string(),
            "AUTH LOGIN"
        );
    }

    #[test]
    fn server_info_keywords() {
        let info = ServerInfo::from_response(&ehlo(&[
            "smtp.example.com greets you",
            "8BITMIME",
            "SIZE 42",
            "starttls",
            "AUTH PLAIN CRAM-MD5 XOAUTH2 OTHER",
        ]))
        .unwrap();

        assert_eq!(info.name(), "smtp.example.com");
        assert!(info.supports_feature(Extension::EightBitMime));
        assert!(info.supports_feature(Extension::StartTls));
        assert!(!info.supports_feature(Extension::SmtpUtfEight));
        assert!(info.supports_auth_mechanism(Mechanism::Plain));
        assert!(info.supports_auth_mechanism(Mechanism::CramMd5));
        assert!(!info.supports_auth_mechanism(Mechanism::Login));

        assert_eq!(info.extension("size"), Some("42"));
        assert_eq!(info.extension("STARTTLS"), Some(""));
        assert_eq!(info.extension("PIPELINING"), None);
        assert_eq!(
            info.auth_mechanisms(),
            vec!["PLAIN", "CRAM-MD5", "XOAUTH2", "OTHER"]
        );
        assert_eq!(
            info.to_string(),
            "smtp.example.com with 8BITMIME, AUTH, SIZE, STARTTLS"
        );
    }

    #[test]
    fn server_info_without_extensions() {
        let info = ServerInfo::from_response(&ehlo(&["me"])).unwrap();
        assert_eq!(info.to_string(), "me with no extensions");
        assert!(info.auth_mechanisms().is_empty());

        assert!(ServerInfo::from_response(&ehlo(&[""])).is_err());
    }

    #[test]
    fn mail_parameter_fmt() {
        assert_eq!(
            MailParameter::Body(MailBodyParameter::EightBitMime).to_string(),
            "BODY=8BITMIME"
        );
        assert_eq!(MailParameter::SmtpUtfEight.to_string(), "SMTPUTF8");
    }
}
