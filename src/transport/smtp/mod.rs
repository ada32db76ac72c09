//! The SMTP transport sends emails using the SMTP protocol.
//!
//! This SMTP client follows [RFC 5321](https://tools.ietf.org/html/rfc5321),
//! and is designed to send emails from an application to a relay email
//! server.
//!
//! It implements the following extensions:
//!
//! * 8BITMIME ([RFC 6152](https://tools.ietf.org/html/rfc6152))
//! * SMTPUTF8 ([RFC 6531](https://tools.ietf.org/html/rfc6531))
//! * AUTH ([RFC 4954](http://tools.ietf.org/html/rfc4954)) with PLAIN, LOGIN, CRAM-MD5 and
//!   XOAUTH2 mechanisms
//! * STARTTLS ([RFC 2487](http://tools.ietf.org/html/rfc2487))
//!
//! #### Connection security
//!
//! Port 465 is dialled with implicit TLS. On any other port the session is
//! upgraded with `STARTTLS` when the server advertises it.
//!
//! #### Simple example
//!
//! ```rust,no_run
//! # #[cfg(feature = "smtp-transport")]
//! # {
//! use mailwright::{Dialer, Message};
//!
//! let mut m = Message::new();
//! m.set_header("From", ["nobody@domain.tld"]);
//! m.set_header("To", ["hei@domain.tld"]);
//! m.set_header("Subject", ["Happy new year"]);
//! m.set_body("text/plain", "Be happy!");
//!
//! let dialer = Dialer::new("smtp.domain.tld", 587, "username", "password");
//!
//! match dialer.dial_and_send(&[m]) {
//!     Ok(_) => println!("Email sent successfully!"),
//!     Err(e) => panic!("Could not send email: {e:?}"),
//! }
//! # }
//! ```
//!
//! #### Keeping the session open
//!
//! [`Dialer::dial`] returns an [`SmtpSender`], which implements
//! [`Sender`](crate::Sender) and can deliver several messages over the same
//! connection:
//!
//! ```rust,no_run
//! # #[cfg(feature = "smtp-transport")]
//! # fn test() -> Result<(), Box<dyn std::error::Error>> {
//! use mailwright::{send, transport::SendCloser, Dialer, Message};
//!
//! let dialer = Dialer::builder("smtp.domain.tld")
//!     .port(587)
//!     .credentials(("username", "password").into())
//!     .local_name("client.domain.tld")
//!     .build();
//!
//! let mut sender = dialer.dial()?;
//! send(&mut sender, &[Message::new()])?;
//! sender.close()?;
//! # Ok(())
//! # }
//! ```

pub use self::{
    dialer::{Dialer, DialerBuilder, SmtpSender, DEFAULT_TIMEOUT},
    error::Error,
};

pub mod authentication;
pub mod client;
pub mod commands;
mod connection_url;
mod dialer;
mod error;
pub mod extension;
pub mod response;

/// Default smtp port
pub const SMTP_PORT: u16 = 25;
/// Default submission port
pub const SUBMISSION_PORT: u16 = 587;
/// Default submission over TLS port
///
/// Defined in [RFC8314](https://tools.ietf.org/html/rfc8314)
pub const SUBMISSIONS_PORT: u16 = 465;
