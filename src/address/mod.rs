//! Email addresses

mod parsers;
mod types;

pub use self::types::{Address, AddressError};

/// Parses a single RFC 5322 mailbox (`Name <user@domain>` or
/// `user@domain`), returning the display name as written and the address.
///
/// A comma-separated list is rejected, only one mailbox is accepted.
///
/// ```
/// use mailwright::address::parse_mailbox;
///
/// let (name, address) = parse_mailbox("\"Doe, John\" <john@example.com>").unwrap();
/// assert_eq!(name.as_deref(), Some("Doe, John"));
/// assert_eq!(address.to_string(), "john@example.com");
/// ```
pub fn parse_mailbox(value: &str) -> Result<(Option<String>, Address), AddressError> {
    use chumsky::Parser;

    let (name, (user, domain)) = parsers::mailbox()
        .parse(value)
        .map_err(|_errs| AddressError::InvalidInput)?;
    let address = Address::new(user, domain)?;
    Ok((name.filter(|name| !name.is_empty()), address))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn bare_address() {
        let (name, address) = parse_mailbox("to1@example.com").unwrap();
        assert_eq!(name, None);
        assert_eq!(address, Address::new("to1", "example.com").unwrap());
    }

    #[test]
    fn named_address() {
        let (name, address) = parse_mailbox("Jane Doe <jane@example.com>").unwrap();
        assert_eq!(name.as_deref(), Some("Jane Doe"));
        assert_eq!(address.to_string(), "jane@example.com");
    }

    #[test]
    fn encoded_word_name() {
        let (_, address) =
            parse_mailbox("=?UTF-8?q?J=C3=A9r=C3=B4me?= <jerome@example.com>").unwrap();
        assert_eq!(address.to_string(), "jerome@example.com");
    }

    #[test]
    fn empty_angle_name() {
        let (name, address) = parse_mailbox(" <kayo@example.com>").unwrap();
        assert_eq!(name, None);
        assert_eq!(address.to_string(), "kayo@example.com");
    }

    #[test]
    fn dotted_parts() {
        let (name, address) =
            parse_mailbox("Ann Lee <ann.lee@mail.example.co.uk>").unwrap();
        assert_eq!(name.as_deref(), Some("Ann Lee"));
        assert_eq!(address.user(), "ann.lee");
        assert_eq!(address.domain(), "mail.example.co.uk");

        assert!(parse_mailbox("ann..lee@example.com").is_err());
        assert!(parse_mailbox("ann.@example.com").is_err());
    }

    #[test]
    fn list_is_rejected() {
        assert_eq!(
            parse_mailbox("a@example.com, b@example.com"),
            Err(AddressError::InvalidInput)
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_mailbox("not an address").is_err());
        assert!(parse_mailbox("").is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_as_string() {
        let address = Address::new("jane", "example.com").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, r#""jane@example.com""#);
        assert_eq!(serde_json::from_str::<Address>(&json).unwrap(), address);
        assert!(serde_json::from_str::<Address>(r#""jane""#).is_err());
    }
}
