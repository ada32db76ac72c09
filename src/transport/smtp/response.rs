//! SMTP replies: a three digit code and zero or more lines of text

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use nom::{
    bytes::streaming::{tag, take_until},
    character::streaming::{one_of, satisfy},
    combinator::{complete, map_opt, opt},
    multi::many0,
    sequence::{preceded, terminated},
    IResult, Parser,
};

use crate::transport::smtp::{error, Error};

/// The first digit indicates severity
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Severity {
    /// 2yx
    PositiveCompletion = 2,
    /// 3yz
    PositiveIntermediate = 3,
    /// 4yz
    TransientNegativeCompletion = 4,
    /// 5yz
    PermanentNegativeCompletion = 5,
}

impl Severity {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '2' => Severity::PositiveCompletion,
            '3' => Severity::PositiveIntermediate,
            '4' => Severity::TransientNegativeCompletion,
            '5' => Severity::PermanentNegativeCompletion,
            _ => return None,
        })
    }
}

/// Second digit
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Category {
    /// x0z
    Syntax = 0,
    /// x1z
    Information = 1,
    /// x2z
    Connections = 2,
    /// x3z
    Unspecified3 = 3,
    /// x4z
    Unspecified4 = 4,
    /// x5z
    MailSystem = 5,
}

impl Category {
    fn from_digit(c: char) -> Option<Self> {
        Some(match c {
            '0' => Category::Syntax,
            '1' => Category::Information,
            '2' => Category::Connections,
            '3' => Category::Unspecified3,
            '4' => Category::Unspecified4,
            '5' => Category::MailSystem,
            _ => return None,
        })
    }
}

/// The detail digit of a response code (third digit)
#[allow(missing_docs)]
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Detail {
    Zero = 0,
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
}

impl Detail {
    fn from_digit(c: char) -> Option<Self> {
        const ALL: [Detail; 10] = [
            Detail::Zero,
            Detail::One,
            Detail::Two,
            Detail::Three,
            Detail::Four,
            Detail::Five,
            Detail::Six,
            Detail::Seven,
            Detail::Eight,
            Detail::Nine,
        ];
        let digit = c.to_digit(10)?;
        ALL.get(digit as usize).copied()
    }
}

macro_rules! digit_display {
    ($($ty:ty),*) => {$(
        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", *self as u8)
            }
        }
    )*};
}

digit_display!(Severity, Category, Detail);

/// Represents a 3 digit SMTP response code
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Code {
    /// First digit of the response code
    pub severity: Severity,
    /// Second digit of the response code
    pub category: Category,
    /// Third digit
    pub detail: Detail,
}

impl Display for Code {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.severity, self.category, self.detail)
    }
}

impl Code {
    /// Creates a new `Code` structure
    pub fn new(severity: Severity, category: Category, detail: Detail) -> Code {
        Code {
            severity,
            category,
            detail,
        }
    }

    /// Tells if the response is positive
    pub fn is_positive(self) -> bool {
        matches!(
            self.severity,
            Severity::PositiveCompletion | Severity::PositiveIntermediate
        )
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        code.detail as u16 + 10 * code.category as u16 + 100 * code.severity as u16
    }
}

/// An SMTP reply, possibly spanning several lines
#[derive(PartialEq, Eq, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Response {
    code: Code,
    /// One entry per reply line, without the code and separator
    message: Vec<String>,
}

impl FromStr for Response {
    type Err = Error;

    fn from_str(s: &str) -> Result<Response, Error> {
        parse_response(s)
            .map(|(_, r)| r)
            .map_err(|e| error::response(e.to_owned()))
    }
}

impl Response {
    /// Creates a new `Response`
    pub fn new(code: Code, message: Vec<String>) -> Response {
        Response { code, message }
    }

    /// Tells if the response is positive
    pub fn is_positive(&self) -> bool {
        self.code.is_positive()
    }

    /// Tests code equality
    pub fn has_code(&self, code: u16) -> bool {
        u16::from(self.code) == code
    }

    /// Returns only the first word of the message if possible
    pub fn first_word(&self) -> Option<&str> {
        self.first_line()
            .and_then(|line| line.split_whitespace().next())
    }

    /// Returns the first line of the message if possible
    pub fn first_line(&self) -> Option<&str> {
        self.message.first().map(String::as_str)
    }

    /// Response code
    pub fn code(&self) -> Code {
        self.code
    }

    /// Server response string (array of lines)
    pub fn message(&self) -> impl Iterator<Item = &str> {
        self.message.iter().map(String::as_str)
    }

    /// All lines joined with newlines, used as error text
    pub(crate) fn text(&self) -> String {
        self.message.join("\n")
    }
}

fn parse_code(i: &str) -> IResult<&str, Code> {
    map_opt(
        (
            one_of("2345"),
            one_of("012345"),
            satisfy(|c| c.is_ascii_digit()),
        ),
        |(s, c, d)| {
            Some(Code::new(
                Severity::from_digit(s)?,
                Category::from_digit(c)?,
                Detail::from_digit(d)?,
            ))
        },
    )
    .parse(i)
}

/// Parses one complete reply
///
/// Continuation lines are `code-text`, the last line is `code text` or a
/// bare `code`. Returns `Incomplete` until the last line has arrived.
pub(crate) fn parse_response(i: &str) -> IResult<&str, Response> {
    let (i, lines) = many0((
        parse_code,
        preceded(tag("-"), terminated(take_until("\r\n"), tag("\r\n"))),
    ))
    .parse(i)?;
    let (i, (last_code, last_line)) =
        (parse_code, opt(preceded(tag(" "), take_until("\r\n")))).parse(i)?;
    let (i, _) = complete(tag("\r\n")).parse(i)?;

    if lines.iter().any(|&(code, _)| code != last_code) {
        return Err(nom::Err::Failure(nom::error::Error::new(
            "",
            nom::error::ErrorKind::Verify,
        )));
    }

    let mut message: Vec<String> = lines.into_iter().map(|(_, text)| text.to_owned()).collect();
    message.push(last_line.unwrap_or_default().to_owned());

    Ok((
        i,
        Response {
            code: last_code,
            message,
        },
    ))
}
