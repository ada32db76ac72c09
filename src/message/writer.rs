//! Message serialization

use std::{
    io::{self, Write},
    iter,
    time::SystemTime,
};

use base64::{engine::general_purpose::STANDARD, write::EncoderWriter};

use super::{encoder, header::Header, Content, Encoding, File, Message, Part};

/// Maximum line length for headers, quoted-printable and base64 bodies
const MAX_LINE_LEN: usize = 76;
/// Maximum nesting of multipart containers
const MAX_DEPTH: usize = 3;

const BOUNDARY_LEN: usize = 40;

#[derive(Debug)]
struct Boundary {
    token: String,
    has_parts: bool,
}

impl Boundary {
    fn random() -> Self {
        Self {
            token: iter::repeat_with(fastrand::alphanumeric)
                .take(BOUNDARY_LEN)
                .collect(),
            has_parts: false,
        }
    }
}

/// Streams a [`Message`] into a sink.
///
/// The first error, whether from the sink or from a body producer, is
/// latched. Every following write is skipped and the error is returned by
/// [`MessageWriter::finish`].
pub(crate) struct MessageWriter<'a> {
    w: &'a mut dyn Write,
    written: u64,
    boundaries: [Option<Boundary>; MAX_DEPTH],
    depth: usize,
    err: Option<io::Error>,
}

impl<'a> MessageWriter<'a> {
    pub(crate) fn new(w: &'a mut dyn Write) -> Self {
        Self {
            w,
            written: 0,
            boundaries: [None, None, None],
            depth: 0,
            err: None,
        }
    }

    /// Bytes written so far, or the latched error
    pub(crate) fn finish(self) -> io::Result<u64> {
        match self.err {
            Some(err) => Err(err),
            None => Ok(self.written),
        }
    }

    pub(crate) fn write_message(&mut self, message: &Message) {
        let header = &message.header;
        if !header.contains("Mime-Version") {
            self.write_str("Mime-Version: 1.0\r\n");
        }
        if !header.contains("Date") {
            self.write_header("Date", &[encoder::format_date(SystemTime::now())]);
        }
        self.write_headers(header);

        let mixed = message.has_mixed_part();
        let related = message.has_related_part();
        let alternative = message.has_alternative_part();

        if mixed {
            self.open_multipart("mixed");
        }
        if related {
            self.open_multipart("related");
        }
        if alternative {
            self.open_multipart("alternative");
        }

        for part in &message.parts {
            self.write_part(part, &message.charset);
        }
        if alternative {
            self.close_multipart();
        }

        self.add_files(&message.embedded, false);
        if related {
            self.close_multipart();
        }

        self.add_files(&message.attachments, true);
        if mixed {
            self.close_multipart();
        }

        if message.parts.is_empty()
            && message.embedded.is_empty()
            && message.attachments.is_empty()
        {
            self.write_str("\r\n");
        }
    }

    pub(crate) fn open_multipart(&mut self, kind: &str) {
        if self.depth == MAX_DEPTH {
            self.latch(io::Error::other("too many nested multipart levels"));
            return;
        }

        let boundary = Boundary::random();
        let content_type = format!("multipart/{kind};\r\n boundary={}", boundary.token);

        if self.depth == 0 {
            self.write_header("Content-Type", &[content_type]);
            self.write_str("\r\n");
        } else {
            let mut header = Header::new();
            header.set("Content-Type", vec![content_type]);
            self.create_part(&header);
        }

        self.boundaries[self.depth] = Some(boundary);
        self.depth += 1;
    }

    pub(crate) fn close_multipart(&mut self) {
        if self.depth == 0 {
            return;
        }

        self.depth -= 1;
        if let Some(boundary) = self.boundaries[self.depth].take() {
            let prefix = if boundary.has_parts { "\r\n" } else { "" };
            self.write_str(&format!("{prefix}--{}--\r\n", boundary.token));
        }
    }

    /// Starts a new part in the innermost multipart, with its header
    /// fields sorted by name
    fn create_part(&mut self, header: &Header) {
        let Some(boundary) = self.depth.checked_sub(1).and_then(|i| self.boundaries[i].as_mut())
        else {
            return;
        };

        let prefix = if boundary.has_parts { "\r\n" } else { "" };
        boundary.has_parts = true;
        let mut buf = format!("{prefix}--{}\r\n", boundary.token);

        let mut fields = header.iter().collect::<Vec<_>>();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (name, values) in fields {
            for value in values {
                buf.push_str(name);
                buf.push_str(": ");
                buf.push_str(value);
                buf.push_str("\r\n");
            }
        }
        buf.push_str("\r\n");

        self.write_str(&buf);
    }

    fn write_part(&mut self, part: &Part, charset: &str) {
        let mut header = Header::new();
        header.set(
            "Content-Type",
            vec![format!("{}; charset={charset}", part.content_type)],
        );
        header.set(
            "Content-Transfer-Encoding",
            vec![part.encoding.as_str().to_owned()],
        );
        self.write_headers(&header);
        self.write_body(part.content.as_ref(), part.encoding);
    }

    fn add_files(&mut self, files: &[File], is_attachment: bool) {
        for file in files {
            let header = file.full_header(is_attachment);
            let encoding = header
                .get("Content-Transfer-Encoding")
                .and_then(|values| values.first())
                .and_then(|value| Encoding::from_name(value))
                .unwrap_or(Encoding::Base64);
            self.write_headers(&header);
            self.write_body(file.content.as_ref(), encoding);
        }
    }

    fn write_headers(&mut self, header: &Header) {
        if self.depth == 0 {
            for (name, values) in header {
                if name != "Bcc" {
                    self.write_header(name, values);
                }
            }
        } else {
            self.create_part(header);
        }
    }

    /// Writes one folded header field
    fn write_header(&mut self, name: &str, values: &[String]) {
        self.write_str(name);
        if values.is_empty() {
            self.write_str(":\r\n");
            return;
        }
        self.write_str(": ");

        let mut chars_left = MAX_LINE_LEN as isize - name.len() as isize - 2;

        for (i, value) in values.iter().enumerate() {
            let len = value.len() as isize;
            if chars_left < 1 || (i != 0 && len + 2 > chars_left) {
                self.write_str(if i == 0 { "\r\n " } else { ",\r\n " });
                chars_left = 75;
            } else if i != 0 {
                self.write_str(", ");
                chars_left -= 2;
            }

            let mut s = value.as_str();
            while s.len() as isize > chars_left {
                match self.write_line(s, chars_left.max(0) as usize) {
                    Some(rest) => {
                        s = rest;
                        chars_left = 75;
                    }
                    None => break,
                }
            }
            self.write_str(s);
            chars_left = match s.rfind('\n') {
                Some(i) => 75 - (s.len() - i - 1) as isize,
                None => chars_left - s.len() as isize,
            };
        }
        self.write_str("\r\n");
    }

    /// Writes the head of `s` up to a fold point and returns the rest, or
    /// `None` without writing anything if `s` cannot be folded
    fn write_line<'s>(&mut self, s: &'s str, chars_left: usize) -> Option<&'s str> {
        let bytes = s.as_bytes();

        if let Some(i) = s.find('\n').filter(|&i| i < chars_left) {
            self.write_str(&s[..=i]);
            return Some(&s[i + 1..]);
        }

        // a fold at the very start would leave an empty line
        if let Some(i) = bytes[..chars_left]
            .iter()
            .rposition(|&b| b == b' ')
            .filter(|&i| i > 0)
        {
            self.write_str(&s[..i]);
            self.write_str("\r\n ");
            return Some(&s[i + 1..]);
        }

        for (i, &b) in bytes.iter().enumerate().skip(75) {
            if b == b' ' {
                self.write_str(&s[..i]);
                self.write_str("\r\n ");
                return Some(&s[i + 1..]);
            }
            if b == b'\n' {
                self.write_str(&s[..=i]);
                return Some(&s[i + 1..]);
            }
        }

        None
    }

    fn write_body(&mut self, content: &dyn Content, encoding: Encoding) {
        if self.depth == 0 {
            self.write_str("\r\n");
        }
        if self.err.is_some() {
            return;
        }

        let result = match encoding {
            Encoding::Base64 => {
                let mut encoder = EncoderWriter::new(Base64LineWriter::new(&mut *self), &STANDARD);
                content
                    .write_to(&mut encoder)
                    .and_then(|()| encoder.finish().map(|_| ()))
            }
            Encoding::Unencoded => content.write_to(self),
            Encoding::QuotedPrintable => {
                // `quoted_printable` only encodes whole buffers, so the body
                // is collected first
                let mut raw = Vec::new();
                content.write_to(&mut raw).and_then(|()| {
                    let encoded = quoted_printable::encode(crlf_line_endings(&raw));
                    self.write_all(&encoded)
                })
            }
        };
        if let Err(err) = result {
            self.latch(err);
        }
    }

    fn write_str(&mut self, s: &str) {
        // A failure is latched by `write`
        let _ = self.write_all(s.as_bytes());
    }

    fn latch(&mut self, err: io::Error) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }
}

impl Write for MessageWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.err.is_some() {
            return Err(io::Error::other("cannot write as writer is in error"));
        }

        match self.w.write(buf) {
            Ok(n) => {
                self.written += n as u64;
                Ok(n)
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => Err(err),
            Err(err) => {
                let returned = io::Error::new(err.kind(), err.to_string());
                self.latch(err);
                Err(returned)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}

/// Breaks base64 output into CRLF terminated lines of 76 characters
struct Base64LineWriter<W> {
    w: W,
    line_len: usize,
}

impl<W: Write> Base64LineWriter<W> {
    fn new(w: W) -> Self {
        Self { w, line_len: 0 }
    }
}

impl<W: Write> Write for Base64LineWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut rest = buf;
        while rest.len() + self.line_len > MAX_LINE_LEN {
            let (line, tail) = rest.split_at(MAX_LINE_LEN - self.line_len);
            self.w.write_all(line)?;
            self.w.write_all(b"\r\n")?;
            rest = tail;
            self.line_len = 0;
        }

        self.w.write_all(rest)?;
        self.line_len += rest.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }
}

/// Normalizes CR, LF and CRLF line breaks to CRLF, so quoted-printable
/// keeps them as hard line breaks
fn crlf_line_endings(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 32);
    let mut bytes = raw.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'\r' => {
                bytes.next_if_eq(&b'\n');
                out.extend_from_slice(b"\r\n");
            }
            b'\n' => out.extend_from_slice(b"\r\n"),
            _ => out.push(b),
        }
    }
    out
}
