//! RFC 2047 encoded words and RFC 5322 dates

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD, Engine};

// 75 columns minus `=?UTF-8?q?` and `?=`
const MAX_CONTENT_LEN: usize = 63;
// Longest input whose base64 form fits in MAX_CONTENT_LEN
const MAX_BASE64_LEN: usize = MAX_CONTENT_LEN / 4 * 3;

const UPPER_HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Encoded-word scheme used for header values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordEncoder {
    /// `B`: base64
    B,
    /// `Q`: quoted-printable variant
    Q,
}

impl WordEncoder {
    fn letter(self) -> char {
        match self {
            WordEncoder::B => 'b',
            WordEncoder::Q => 'q',
        }
    }

    /// Encodes `s` as one or more encoded words if it contains any byte
    /// outside printable ASCII (tab excepted). Clean values are returned
    /// unchanged.
    ///
    /// Words are split to stay within 75 columns only when the charset is
    /// UTF-8, so that a split never lands inside a character.
    ///
    /// ```
    /// use mailwright::message::WordEncoder;
    ///
    /// assert_eq!(WordEncoder::Q.encode("UTF-8", "Hello"), "Hello");
    /// assert_eq!(WordEncoder::Q.encode("UTF-8", "¡Hola!"), "=?UTF-8?q?=C2=A1Hola!?=");
    /// assert_eq!(WordEncoder::B.encode("UTF-8", "¡Hola!"), "=?UTF-8?b?wqFIb2xhIQ==?=");
    /// ```
    pub fn encode(self, charset: &str, s: &str) -> String {
        if !needs_encoding(s) {
            return s.to_owned();
        }

        let mut buf = String::with_capacity(s.len() * 2);
        self.open_word(&mut buf, charset);
        if charset.eq_ignore_ascii_case("UTF-8") {
            match self {
                WordEncoder::B => self.b_words(&mut buf, charset, s),
                WordEncoder::Q => self.q_words(&mut buf, charset, s),
            }
        } else {
            match self {
                WordEncoder::B => buf.push_str(&STANDARD.encode(s)),
                WordEncoder::Q => write_q_string(&mut buf, s),
            }
        }
        buf.push_str("?=");
        buf
    }

    fn open_word(self, buf: &mut String, charset: &str) {
        buf.push_str("=?");
        buf.push_str(charset);
        buf.push('?');
        buf.push(self.letter());
        buf.push('?');
    }

    fn split_word(self, buf: &mut String, charset: &str) {
        buf.push_str("?= ");
        self.open_word(buf, charset);
    }

    fn b_words(self, buf: &mut String, charset: &str, s: &str) {
        if base64_len(s.len()) <= MAX_CONTENT_LEN {
            buf.push_str(&STANDARD.encode(s));
            return;
        }

        let mut current = 0;
        let mut last = 0;
        for (i, c) in s.char_indices() {
            let len = c.len_utf8();
            if current + len <= MAX_BASE64_LEN {
                current += len;
            } else {
                buf.push_str(&STANDARD.encode(&s[last..i]));
                self.split_word(buf, charset);
                last = i;
                current = len;
            }
        }
        buf.push_str(&STANDARD.encode(&s[last..]));
    }

    fn q_words(self, buf: &mut String, charset: &str, s: &str) {
        let mut current = 0;
        for c in s.chars() {
            let encoded_len = if is_q_literal(c) {
                1
            } else {
                3 * c.len_utf8()
            };
            if current + encoded_len > MAX_CONTENT_LEN {
                self.split_word(buf, charset);
                current = 0;
            }
            let mut tmp = [0; 4];
            write_q_string(buf, c.encode_utf8(&mut tmp));
            current += encoded_len;
        }
    }
}

fn needs_encoding(s: &str) -> bool {
    s.chars().any(|c| (c < ' ' || c > '~') && c != '\t')
}

fn is_q_literal(c: char) -> bool {
    (' '..='~').contains(&c) && !matches!(c, '=' | '?' | '_')
}

fn write_q_string(buf: &mut String, s: &str) {
    for b in s.bytes() {
        match b {
            b' ' => buf.push('_'),
            b'!'..=b'~' if !matches!(b, b'=' | b'?' | b'_') => buf.push(char::from(b)),
            _ => {
                buf.push('=');
                buf.push(char::from(UPPER_HEX[usize::from(b >> 4)]));
                buf.push(char::from(UPPER_HEX[usize::from(b & 0x0f)]));
            }
        }
    }
}

fn base64_len(len: usize) -> usize {
    (len + 2) / 3 * 4
}

/// Whether a display name contains RFC 5322 specials and so cannot be
/// used as a bare phrase
pub(crate) fn has_specials(text: &str) -> bool {
    text.bytes().any(|b| {
        matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b':' | b';' | b'@' | b'\\' | b',' | b'.' | b'"'
        )
    })
}

/// Formats `time` as an RFC 5322 date with a numeric UTC zone, e.g.
/// `Wed, 25 Jun 2014 17:46:00 +0000`
pub fn format_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time).replacen(" GMT", " +0000", 1)
}

#[cfg(test)]
mod test {
    use std::time::{Duration, UNIX_EPOCH};

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn clean_values_pass_through() {
        assert_eq!(WordEncoder::Q.encode("UTF-8", "Hello\tworld"), "Hello\tworld");
        assert_eq!(WordEncoder::B.encode("UTF-8", ""), "");
    }

    #[test]
    fn q_encoding() {
        assert_eq!(
            WordEncoder::Q.encode("UTF-8", "Café au lait"),
            "=?UTF-8?q?Caf=C3=A9_au_lait?="
        );
        assert_eq!(
            WordEncoder::Q.encode("UTF-8", "a=b?c_d é"),
            "=?UTF-8?q?a=3Db=3Fc=5Fd_=C3=A9?="
        );
    }

    #[test]
    fn q_encoding_splits_long_words() {
        let encoded = WordEncoder::Q.encode("UTF-8", &"é".repeat(12));
        assert_eq!(
            encoded,
            format!(
                "=?UTF-8?q?{}?= =?UTF-8?q?{}?=",
                "=C3=A9".repeat(10),
                "=C3=A9".repeat(2)
            )
        );
        for word in encoded.split(' ') {
            assert!(word.len() <= 75);
        }
    }

    #[test]
    fn b_encoding_splits_long_words() {
        let encoded = WordEncoder::B.encode("UTF-8", &"ü".repeat(30));
        let words = encoded.split(' ').collect::<Vec<_>>();
        assert_eq!(words.len(), 2);
        assert_eq!(
            words[0],
            format!("=?UTF-8?b?{}?=", STANDARD.encode("ü".repeat(22)))
        );
        assert_eq!(
            words[1],
            format!("=?UTF-8?b?{}?=", STANDARD.encode("ü".repeat(8)))
        );
    }

    #[test]
    fn other_charsets_are_not_split() {
        let encoded = WordEncoder::Q.encode("ISO-8859-1", &"\u{e9}".repeat(30));
        assert!(!encoded.contains(' '));
        assert!(encoded.starts_with("=?ISO-8859-1?q?=C3=A9"));
    }

    #[test]
    fn specials() {
        assert!(has_specials("Doe, John"));
        assert!(has_specials("J. Doe"));
        assert!(!has_specials("John Doe"));
    }

    #[test]
    fn date_format() {
        let time = UNIX_EPOCH + Duration::from_secs(1_403_718_360);
        assert_eq!(format_date(time), "Wed, 25 Jun 2014 17:46:00 +0000");
    }
}
