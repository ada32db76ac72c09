//! Mailwright composes RFC 5322 email messages and delivers them over SMTP.
//!
//! A [`Message`] holds header fields, body alternatives, attachments and
//! embedded files. It serializes itself with the right multipart structure,
//! folded headers and quoted-printable or base64 bodies.
//!
//! Messages are handed to a [`Sender`]. The SMTP [`Dialer`] is the
//! provided implementation: it connects, upgrades to TLS, authenticates and
//! runs the mail transaction.
//!
//! ```rust,no_run
//! use mailwright::{Dialer, Message};
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let mut m = Message::new();
//! m.set_header("From", ["alex@example.com"]);
//! m.set_header("To", ["bob@example.com", "cora@example.com"]);
//! m.set_address_header("Cc", "dan@example.com", "Dan");
//! m.set_header("Subject", ["Hello!"]);
//! m.set_body("text/html", "Hello <b>Bob</b> and <i>Cora</i>!");
//!
//! let dialer = Dialer::new("smtp.example.com", 587, "user", "123456");
//! dialer.dial_and_send(&[m])?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * **smtp-transport** (default): the SMTP [`Dialer`]
//! * **native-tls** (default): TLS through the system library
//! * **rustls**: TLS through `rustls` with the `webpki-roots` trust store
//! * **tracing** (default): debug logging of the SMTP exchange
//! * **serde**: `Serialize`/`Deserialize` on configuration types

#![forbid(unsafe_code)]
#![deny(missing_docs, unstable_features)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::error::Error as StdError;

pub mod address;
pub mod error;
pub mod message;
pub mod transport;

pub use crate::{
    address::{Address, AddressError},
    error::Error,
    message::{Encoding, File, Message, Part},
    transport::{send, send_fn, SendCloser, SendError, SendFn, Sender, WriteTo},
};
#[cfg(feature = "smtp-transport")]
pub use crate::transport::smtp::Dialer;

pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;
