//! Representation of an email address

use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    net::IpAddr,
    str::FromStr,
};

use email_address::EmailAddress;
use idna::domain_to_ascii;

/// An email address in canonical form (_user@domain.tld_).
///
/// Envelope senders and recipients are carried as `Address`; display
/// names live only in the message headers.
///
/// ```
/// use mailwright::Address;
///
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let address = "user@email.com".parse::<Address>()?;
/// assert_eq!(address.user(), "user");
/// assert_eq!(address.domain(), "email.com");
/// assert_eq!(address, Address::new("user", "email.com")?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Address {
    serialized: String,
    /// Byte offset of the '@'
    at_start: usize,
}

impl Address {
    /// Creates a new email address from a user and domain, validating both.
    pub fn new<U: AsRef<str>, D: AsRef<str>>(user: U, domain: D) -> Result<Self, AddressError> {
        (user, domain).try_into()
    }

    /// User portion of the address
    pub fn user(&self) -> &str {
        &self.serialized[..self.at_start]
    }

    /// Domain portion of the address
    pub fn domain(&self) -> &str {
        &self.serialized[self.at_start + 1..]
    }

    /// Whether the address can be sent without the `SMTPUTF8` extension
    pub fn is_ascii(&self) -> bool {
        self.serialized.is_ascii()
    }

    fn check_user(user: &str) -> Result<(), AddressError> {
        if EmailAddress::is_valid_local_part(user) {
            Ok(())
        } else {
            Err(AddressError::InvalidUser)
        }
    }

    fn check_domain(domain: &str) -> Result<(), AddressError> {
        Address::check_domain_ascii(domain).or_else(|_| {
            domain_to_ascii(domain)
                .map_err(|_| AddressError::InvalidDomain)
                .and_then(|domain| Address::check_domain_ascii(&domain))
        })
    }

    fn check_domain_ascii(domain: &str) -> Result<(), AddressError> {
        if EmailAddress::is_valid_domain(domain) {
            return Ok(());
        }

        let ip = domain
            .strip_prefix('[')
            .and_then(|ip| ip.strip_suffix(']'))
            .unwrap_or(domain);

        if ip.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        Err(AddressError::InvalidDomain)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.serialized)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(val: &str) -> Result<Self, AddressError> {
        let at_start = check_address(val)?;
        Ok(Address {
            serialized: val.into(),
            at_start,
        })
    }
}

impl<U, D> TryFrom<(U, D)> for Address
where
    U: AsRef<str>,
    D: AsRef<str>,
{
    type Error = AddressError;

    fn try_from((user, domain): (U, D)) -> Result<Self, Self::Error> {
        let user = user.as_ref();
        Address::check_user(user)?;

        let domain = domain.as_ref();
        Address::check_domain(domain)?;

        Ok(Address {
            serialized: format!("{user}@{domain}"),
            at_start: user.len(),
        })
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(serialized: String) -> Result<Self, AddressError> {
        let at_start = check_address(&serialized)?;
        Ok(Address {
            serialized,
            at_start,
        })
    }
}

impl From<Address> for String {
    fn from(address: Address) -> String {
        address.serialized
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.serialized
    }
}

fn check_address(val: &str) -> Result<usize, AddressError> {
    let mut parts = val.rsplitn(2, '@');
    let domain = parts.next().ok_or(AddressError::MissingParts)?;
    let user = parts.next().ok_or(AddressError::MissingParts)?;

    Address::check_user(user)?;
    Address::check_domain(domain)?;
    Ok(user.len())
}

/// Errors in email address parsing
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[non_exhaustive]
pub enum AddressError {
    /// Missing domain or user
    MissingParts,
    /// Invalid email user
    InvalidUser,
    /// Invalid email domain
    InvalidDomain,
    /// Input is not a single mailbox
    InvalidInput,
}

impl Error for AddressError {}

impl Display for AddressError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AddressError::MissingParts => f.write_str("missing domain or user"),
            AddressError::InvalidUser => f.write_str("invalid email user"),
            AddressError::InvalidDomain => f.write_str("invalid email domain"),
            AddressError::InvalidInput => f.write_str("invalid mailbox"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn ascii_address() {
        let addr = Address::from_str("something@example.com").unwrap();
        let addr2 = Address::new("something", "example.com").unwrap();
        assert_eq!(addr, addr2);
        assert_eq!(addr.user(), "something");
        assert_eq!(addr.domain(), "example.com");
        assert!(addr.is_ascii());
    }

    #[test]
    fn ip_literal_domains() {
        let v4 = Address::from_str("something@1.1.1.1").unwrap();
        assert_eq!(v4.domain(), "1.1.1.1");
        let v6 = Address::from_str("something@[2606:4700:4700::1111]").unwrap();
        assert_eq!(v6.domain(), "[2606:4700:4700::1111]");
    }

    #[test]
    fn unicode_address() {
        let addr = Address::from_str("user@exämple.com").unwrap();
        assert_eq!(addr.domain(), "exämple.com");
        assert!(!addr.is_ascii());
    }

    #[test]
    fn invalid_addresses() {
        assert_eq!(
            Address::from_str("example.com"),
            Err(AddressError::MissingParts)
        );
        assert_eq!(
            Address::from_str("a b@example.com"),
            Err(AddressError::InvalidUser)
        );
        assert_eq!(
            Address::from_str("user@exa mple"),
            Err(AddressError::InvalidDomain)
        );
    }
}
