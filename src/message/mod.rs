//! Email composition
//!
//! A [`Message`] is a set of header fields plus an ordered list of body
//! [`Part`]s, attachments and embedded [`File`]s. It is turned into RFC 5322
//! text by [`Message::write_to`], which picks the multipart structure from
//! what the message contains:
//!
//! * several parts are wrapped in `multipart/alternative`
//! * embedded files go with the parts in `multipart/related`
//! * attachments go with everything else in `multipart/mixed`
//!
//! Header values are RFC 2047 encoded when set, with the `B` encoding when
//! the message body encoding is base64 and `Q` otherwise.
//!
//! ```rust
//! use mailwright::Message;
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let mut m = Message::new();
//! m.set_header("From", ["alex@example.com"]);
//! m.set_address_header("To", "bob@example.com", "Bob");
//! m.set_header("Subject", ["Hello!"]);
//! m.set_header("Date", ["Wed, 25 Jun 2014 17:46:00 +0000"]);
//! m.set_body("text/plain", "Hello Bob!");
//!
//! let formatted = String::from_utf8(m.formatted()?)?;
//! assert_eq!(
//!     formatted,
//!     concat!(
//!         "Mime-Version: 1.0\r\n",
//!         "From: alex@example.com\r\n",
//!         "To: \"Bob\" <bob@example.com>\r\n",
//!         "Subject: Hello!\r\n",
//!         "Date: Wed, 25 Jun 2014 17:46:00 +0000\r\n",
//!         "Content-Type: text/plain; charset=UTF-8\r\n",
//!         "Content-Transfer-Encoding: quoted-printable\r\n",
//!         "\r\n",
//!         "Hello Bob!",
//!     )
//! );
//! # Ok(())
//! # }
//! ```
//!
//! Plain text and HTML alternatives, with an attachment:
//!
//! ```rust
//! use mailwright::{message::File, Message};
//!
//! let mut m = Message::new();
//! m.set_header("From", ["alex@example.com"]);
//! m.set_header("To", ["bob@example.com", "cora@example.com"]);
//! m.set_header("Subject", ["Quarterly report"]);
//! m.add_alternative("text/plain", "See attached.");
//! m.add_alternative("text/html", "<p>See attached.</p>");
//! m.attach_file(File::from_content("report.csv", "q1,q2\n10,12\n"));
//!
//! assert!(m.has_mixed_part());
//! assert!(m.has_alternative_part());
//! ```

use std::{
    fmt::{self, Debug, Display},
    io::{self, Write},
    path::Path,
    sync::Arc,
    time::SystemTime,
};

use crate::{
    address::{self, Address},
    Error,
};

pub use self::{
    content::{content_fn, Content, ContentFn, FileContent},
    encoder::{format_date, WordEncoder},
    header::Header,
};

mod content;
mod encoder;
mod header;
mod writer;

const DEFAULT_CHARSET: &str = "UTF-8";

/// Content transfer encoding of a body part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Encoding {
    /// RFC 2045 quoted-printable
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "quoted-printable"))]
    QuotedPrintable,
    /// RFC 2045 base64, wrapped at 76 columns
    #[cfg_attr(feature = "serde", serde(rename = "base64"))]
    Base64,
    /// Body is written as is. Headers are still Q-encoded.
    #[cfg_attr(feature = "serde", serde(rename = "8bit"))]
    Unencoded,
}

impl Encoding {
    /// Value of the `Content-Transfer-Encoding` header
    pub const fn as_str(self) -> &'static str {
        match self {
            Encoding::QuotedPrintable => "quoted-printable",
            Encoding::Base64 => "base64",
            Encoding::Unencoded => "8bit",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        [Encoding::QuotedPrintable, Encoding::Base64, Encoding::Unencoded]
            .into_iter()
            .find(|encoding| encoding.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A body part of a [`Message`]
#[derive(Clone)]
pub struct Part {
    content_type: String,
    content: Arc<dyn Content>,
    encoding: Encoding,
}

impl Part {
    /// Overrides the transfer encoding inherited from the message
    pub fn set_encoding(&mut self, encoding: Encoding) -> &mut Self {
        self.encoding = encoding;
        self
    }

    /// Media type of the part, without the charset
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Transfer encoding of the part
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}

impl Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("content_type", &self.content_type)
            .field("encoding", &self.encoding)
            .finish_non_exhaustive()
    }
}

/// An attached or embedded file.
///
/// Missing `Content-Type`, `Content-Transfer-Encoding`,
/// `Content-Disposition` and (for embedded files) `Content-ID` fields are
/// filled in when the message is written, from the file name.
#[derive(Clone)]
pub struct File {
    name: String,
    header: Header,
    content: Arc<dyn Content>,
}

impl File {
    /// A file read from `path` each time the message is written, named
    /// after the last component of the path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_content(name, FileContent::new(path))
    }

    /// A file with in-memory or generated content
    pub fn from_content<N, C>(name: N, content: C) -> Self
    where
        N: Into<String>,
        C: Content + 'static,
    {
        Self {
            name: name.into(),
            header: Header::new(),
            content: Arc::new(content),
        }
    }

    /// Name shown to the recipient, when it differs from the name on disk
    pub fn rename<N: Into<String>>(&mut self, name: N) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Sets a MIME header field of the part holding the file
    pub fn set_header<F, V>(&mut self, field: F, value: V) -> &mut Self
    where
        F: Into<String>,
        V: Into<String>,
    {
        self.header.set(field, vec![value.into()]);
        self
    }

    /// Sets several MIME header fields of the part holding the file
    pub fn set_headers<I, F, V>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (F, Vec<V>)>,
        F: Into<String>,
        V: Into<String>,
    {
        for (field, values) in fields {
            self.header
                .set(field, values.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Replaces what is written as the file body
    pub fn set_content<C: Content + 'static>(&mut self, content: C) -> &mut Self {
        self.content = Arc::new(content);
        self
    }

    /// Name of the file
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header fields set on the file
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Header as written, with defaults for any missing field
    fn full_header(&self, is_attachment: bool) -> Header {
        let mut header = self.header.clone();
        if !header.contains("Content-Type") {
            let media_type = mime_guess::from_path(&self.name)
                .first()
                .unwrap_or(mime::APPLICATION_OCTET_STREAM);
            header.set(
                "Content-Type",
                vec![format!("{media_type}; name=\"{}\"", self.name)],
            );
        }
        if !header.contains("Content-Transfer-Encoding") {
            header.set(
                "Content-Transfer-Encoding",
                vec![Encoding::Base64.as_str().to_owned()],
            );
        }
        if !header.contains("Content-Disposition") {
            let disposition = if is_attachment { "attachment" } else { "inline" };
            header.set(
                "Content-Disposition",
                vec![format!("{disposition}; filename=\"{}\"", self.name)],
            );
        }
        if !is_attachment && !header.contains("Content-ID") {
            header.set("Content-ID", vec![format!("<{}>", self.name)]);
        }
        header
    }
}

impl Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("name", &self.name)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Message`] settings that must be fixed up front
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    charset: String,
    encoding: Encoding,
}

impl MessageBuilder {
    /// Charset of text parts and encoded headers, `UTF-8` by default
    pub fn charset<S: Into<String>>(mut self, charset: S) -> Self {
        self.charset = charset.into();
        self
    }

    /// Default part encoding, quoted-printable by default. It also selects
    /// the header encoder: `B` for base64, `Q` for anything else.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Creates an empty message with these settings
    pub fn build(self) -> Message {
        let word_encoder = match self.encoding {
            Encoding::Base64 => WordEncoder::B,
            Encoding::QuotedPrintable | Encoding::Unencoded => WordEncoder::Q,
        };
        Message {
            header: Header::new(),
            parts: Vec::new(),
            attachments: Vec::new(),
            embedded: Vec::new(),
            charset: self.charset,
            encoding: self.encoding,
            word_encoder,
        }
    }
}

/// An email message
#[derive(Debug, Clone)]
pub struct Message {
    header: Header,
    parts: Vec<Part>,
    attachments: Vec<File>,
    embedded: Vec<File>,
    charset: String,
    encoding: Encoding,
    word_encoder: WordEncoder,
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl Message {
    /// A message with `UTF-8` charset and quoted-printable encoding
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder to pick a charset or encoding other than the defaults
    pub fn builder() -> MessageBuilder {
        MessageBuilder {
            charset: DEFAULT_CHARSET.to_owned(),
            encoding: Encoding::default(),
        }
    }

    /// Clears headers, parts and files. Charset and encoding are kept.
    pub fn reset(&mut self) {
        self.header.clear();
        self.parts.clear();
        self.attachments.clear();
        self.embedded.clear();
    }

    /// Charset of text parts and encoded headers
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Default transfer encoding of the parts
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Sets a header field, RFC 2047 encoding each value when needed
    pub fn set_header<F, I, V>(&mut self, field: F, values: I)
    where
        F: Into<String>,
        I: IntoIterator<Item = V>,
        V: AsRef<str>,
    {
        let values = values
            .into_iter()
            .map(|value| self.encode_string(value.as_ref()))
            .collect();
        self.header.set(field, values);
    }

    /// Sets several header fields at once
    pub fn set_headers<I, F, V, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<String>,
        V: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (field, values) in fields {
            self.set_header(field, values);
        }
    }

    /// Sets a field to a single formatted address, see
    /// [`Message::format_address`]
    pub fn set_address_header<F: Into<String>>(&mut self, field: F, address: &str, name: &str) {
        let formatted = self.format_address(address, name);
        self.header.set(field, vec![formatted]);
    }

    /// Formats an address and a display name as an RFC 5322 mailbox.
    ///
    /// ```
    /// use mailwright::Message;
    ///
    /// let m = Message::new();
    /// assert_eq!(m.format_address("a@example.com", ""), "a@example.com");
    /// assert_eq!(
    ///     m.format_address("a@example.com", "Doe, \"J\""),
    ///     "\"Doe, \\\"J\\\"\" <a@example.com>"
    /// );
    /// assert_eq!(
    ///     m.format_address("a@example.com", "Jérôme"),
    ///     "=?UTF-8?q?J=C3=A9r=C3=B4me?= <a@example.com>"
    /// );
    /// ```
    pub fn format_address(&self, address: &str, name: &str) -> String {
        if name.is_empty() {
            return address.to_owned();
        }

        let encoded = self.encode_string(name);
        let mut buf = String::with_capacity(encoded.len() + address.len() + 5);
        if encoded == name {
            buf.push('"');
            for c in name.chars() {
                if c == '\\' || c == '"' {
                    buf.push('\\');
                }
                buf.push(c);
            }
            buf.push('"');
        } else if encoder::has_specials(name) {
            buf.push_str(&WordEncoder::B.encode(&self.charset, name));
        } else {
            buf.push_str(&encoded);
        }
        buf.push_str(" <");
        buf.push_str(address);
        buf.push('>');
        buf
    }

    /// Sets a field to a date, see [`Message::format_date`]
    pub fn set_date_header<F: Into<String>>(&mut self, field: F, date: SystemTime) {
        self.header.set(field, vec![format_date(date)]);
    }

    /// Formats a date as an RFC 5322 date
    pub fn format_date(&self, date: SystemTime) -> String {
        format_date(date)
    }

    /// Values of a header field, as stored (encoded)
    pub fn get_header(&self, field: &str) -> Option<&[String]> {
        self.header.get(field)
    }

    /// Every header field of the message
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Replaces every body part with a single one
    pub fn set_body<T, C>(&mut self, content_type: T, body: C) -> &mut Part
    where
        T: Into<String>,
        C: Content + 'static,
    {
        self.parts.clear();
        self.add_alternative(content_type, body)
    }

    /// Appends an alternative part. Parts go from the lowest to the highest
    /// fidelity, so the plain text version should be added first.
    pub fn add_alternative<T, C>(&mut self, content_type: T, body: C) -> &mut Part
    where
        T: Into<String>,
        C: Content + 'static,
    {
        let part = Part {
            content_type: content_type.into(),
            content: Arc::new(body),
            encoding: self.encoding,
        };
        self.parts.push(part);
        let last = self.parts.len() - 1;
        &mut self.parts[last]
    }

    /// Appends an alternative part rendered by `f`, handy with templates
    pub fn add_alternative_writer<T, F>(&mut self, content_type: T, f: F) -> &mut Part
    where
        T: Into<String>,
        F: Fn(&mut dyn Write) -> io::Result<()> + Send + Sync + 'static,
    {
        self.add_alternative(content_type, content_fn(f))
    }

    /// Attaches the file at `path`
    pub fn attach<P: AsRef<Path>>(&mut self, path: P) -> &mut File {
        self.attach_file(File::new(path))
    }

    /// Attaches a file built with [`File`]
    pub fn attach_file(&mut self, file: File) -> &mut File {
        self.attachments.push(file);
        let last = self.attachments.len() - 1;
        &mut self.attachments[last]
    }

    /// Embeds the file at `path`, to be referenced as `cid:<name>`
    pub fn embed<P: AsRef<Path>>(&mut self, path: P) -> &mut File {
        self.embed_file(File::new(path))
    }

    /// Embeds a file built with [`File`]
    pub fn embed_file(&mut self, file: File) -> &mut File {
        self.embedded.push(file);
        let last = self.embedded.len() - 1;
        &mut self.embedded[last]
    }

    /// Body parts, in the order they were added
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Attached files
    pub fn attachments(&self) -> &[File] {
        &self.attachments
    }

    /// Embedded files
    pub fn embedded(&self) -> &[File] {
        &self.embedded
    }

    /// Whether the message is written as `multipart/mixed`
    pub fn has_mixed_part(&self) -> bool {
        (!self.parts.is_empty() && !self.attachments.is_empty()) || self.attachments.len() > 1
    }

    /// Whether the message contains a `multipart/related` entity
    pub fn has_related_part(&self) -> bool {
        (!self.parts.is_empty() && !self.embedded.is_empty()) || self.embedded.len() > 1
    }

    /// Whether the message contains a `multipart/alternative` entity
    pub fn has_alternative_part(&self) -> bool {
        self.parts.len() > 1
    }

    /// Envelope sender: `Sender` if set, otherwise the first `From` value
    pub fn get_from(&self) -> Result<Address, Error> {
        let value = self
            .header
            .get("Sender")
            .and_then(|values| values.first())
            .or_else(|| self.header.get("From").and_then(|values| values.first()))
            .ok_or(Error::MissingFrom)?;
        parse_address(value)
    }

    /// Envelope recipients from `To`, `Cc` and `Bcc`, without duplicates
    pub fn get_recipients(&self) -> Result<Vec<Address>, Error> {
        let mut recipients: Vec<Address> = Vec::new();
        for field in ["To", "Cc", "Bcc"] {
            for value in self.header.get(field).unwrap_or_default() {
                let address = parse_address(value)?;
                if !recipients.contains(&address) {
                    recipients.push(address);
                }
            }
        }
        Ok(recipients)
    }

    /// Writes the whole message into `w` and returns the number of bytes
    /// written.
    ///
    /// On error the output is incomplete and should be discarded.
    pub fn write_to(&self, w: &mut dyn Write) -> io::Result<u64> {
        let mut writer = writer::MessageWriter::new(w);
        writer.write_message(self);
        writer.finish()
    }

    /// The message serialized into memory
    pub fn formatted(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    fn encode_string(&self, value: &str) -> String {
        self.word_encoder.encode(&self.charset, value)
    }
}

fn parse_address(value: &str) -> Result<Address, Error> {
    address::parse_mailbox(value)
        .map(|(_name, address)| address)
        .map_err(|source| Error::InvalidAddress {
            value: value.to_owned(),
            source,
        })
}
