//! ### Sending Messages
//!
//! A [`Sender`] delivers an already composed message to a list of
//! recipients. The message is passed as a [`WriteTo`] so the sender decides
//! where the bytes go: a network stream, a buffer, a file.
//!
//! [`send`] walks a batch of messages, extracts the envelope of each one
//! from its headers and stops at the first failure.
//!
//! Any closure with the right signature can act as a sender through
//! [`send_fn`]:
//!
//! ```rust
//! use mailwright::{send, send_fn, Message};
//! use std::io;
//!
//! let mut m = Message::new();
//! m.set_header("From", ["alex@example.com"]);
//! m.set_header("To", ["bob@example.com"]);
//! m.set_body("text/plain", "Hi!");
//!
//! let mut outbox = Vec::new();
//! let mut sender = send_fn(|from, to, message| -> io::Result<()> {
//!     let mut raw = Vec::new();
//!     message.write_to(&mut raw)?;
//!     outbox.push((from.to_string(), to.len(), raw));
//!     Ok(())
//! });
//! send(&mut sender, &[m]).unwrap();
//! assert_eq!(outbox.len(), 1);
//! ```

use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    io::{self, Write},
};

use crate::{Address, BoxError, Message};

#[cfg(feature = "smtp-transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "smtp-transport")))]
pub mod smtp;

/// Something that can be serialized into a byte sink
pub trait WriteTo {
    /// Writes the content into `w`, returning the number of bytes written
    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64>;
}

impl WriteTo for Message {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        Message::write_to(self, w)
    }
}

impl WriteTo for [u8] {
    fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        w.write_all(self)?;
        Ok(self.len() as u64)
    }
}

/// Blocking delivery of one message
pub trait Sender {
    /// Error produced by the sender
    type Error: StdError + Send + Sync + 'static;

    /// Sends `message` from `from` to every address in `to`
    fn send(&mut self, from: &Address, to: &[Address], message: &dyn WriteTo)
        -> Result<(), Self::Error>;
}

/// A [`Sender`] holding a resource that has to be released
pub trait SendCloser: Sender {
    /// Ends the session
    fn close(&mut self) -> Result<(), Self::Error>;
}

impl<S: Sender + ?Sized> Sender for &mut S {
    type Error = S::Error;

    fn send(
        &mut self,
        from: &Address,
        to: &[Address],
        message: &dyn WriteTo,
    ) -> Result<(), Self::Error> {
        (**self).send(from, to, message)
    }
}

/// Adapter turning a closure into a [`Sender`], see [`send_fn`]
#[derive(Debug, Clone, Copy)]
pub struct SendFn<F>(F);

/// Wraps `f` in a [`Sender`] that calls it for every message
pub fn send_fn<F, E>(f: F) -> SendFn<F>
where
    F: FnMut(&Address, &[Address], &dyn WriteTo) -> Result<(), E>,
    E: StdError + Send + Sync + 'static,
{
    SendFn(f)
}

impl<F, E> Sender for SendFn<F>
where
    F: FnMut(&Address, &[Address], &dyn WriteTo) -> Result<(), E>,
    E: StdError + Send + Sync + 'static,
{
    type Error = E;

    fn send(&mut self, from: &Address, to: &[Address], message: &dyn WriteTo) -> Result<(), E> {
        (self.0)(from, to, message)
    }
}

/// Sends `messages` in order through `sender`, stopping at the first one
/// that fails.
///
/// The envelope of each message is its [`get_from`](Message::get_from)
/// address and its [`get_recipients`](Message::get_recipients) list.
pub fn send<S: Sender + ?Sized>(sender: &mut S, messages: &[Message]) -> Result<(), SendError> {
    for (i, message) in messages.iter().enumerate() {
        send_one(sender, message).map_err(|source| SendError {
            index: i + 1,
            source,
        })?;
    }
    Ok(())
}

fn send_one<S: Sender + ?Sized>(sender: &mut S, message: &Message) -> Result<(), BoxError> {
    let from = message.get_from()?;
    let to = message.get_recipients()?;
    sender.send(&from, &to, message)?;
    Ok(())
}

/// A message of a batch could not be sent
#[derive(Debug)]
pub struct SendError {
    index: usize,
    source: BoxError,
}

impl SendError {
    /// 1-based position of the failing message in the batch
    pub fn index(&self) -> usize {
        self.index
    }

    /// Consumes the error, returning the underlying cause
    pub fn into_source(self) -> Box<dyn StdError + Send + Sync> {
        self.source
    }
}

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "could not send email {}: {}", self.index, self.source)
    }
}

impl StdError for SendError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source)
    }
}
