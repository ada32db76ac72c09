//! Partial [RFC2822] mailbox grammar.
//!
//! [RFC2822]: https://datatracker.ietf.org/doc/html/rfc2822

use chumsky::{error::Cheap, prelude::*};

// WSP            =  SP / HTAB
fn wsp() -> impl Parser<char, char, Error = Cheap<char>> {
    one_of([' ', '\t'])
}

// NO-WS-CTL       =       %d1-8 / %d11 / %d12 / %d14-31 / %d127
fn no_ws_ctl() -> impl Parser<char, char, Error = Cheap<char>> {
    filter(|c| matches!(u32::from(*c), 1..=8 | 11 | 12 | 14..=31 | 127))
}

// text            =       %d1-9 / %d11 / %d12 / %d14-127
fn text() -> impl Parser<char, char, Error = Cheap<char>> {
    filter(|c| matches!(u32::from(*c), 1..=9 | 11 | 12 | 14..=127))
}

// quoted-pair     =       ("\" text)
fn quoted_pair() -> impl Parser<char, char, Error = Cheap<char>> {
    just('\\').ignore_then(text())
}

// FWS, without comments or line folding: headers are unfolded before
// they are stored.
fn fws() -> impl Parser<char, Option<char>, Error = Cheap<char>> {
    wsp().or_not().then_ignore(wsp().ignored().repeated())
}

// atext, extended with non-ASCII UTF-8 as allowed by RFC 6532
fn atext() -> impl Parser<char, char, Error = Cheap<char>> {
    filter(|c: &char| {
        c.is_ascii_alphanumeric()
            || "!#$%&'*+-/=?^_`{|}~".contains(*c)
            || c.len_utf8() > 1
    })
}

// atom            =       [CFWS] 1*atext [CFWS]
fn atom() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    fws().chain(atext().repeated().at_least(1))
}

// dot-atom        =       [CFWS] dot-atom-text [CFWS]
fn dot_atom() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    fws().chain(dot_atom_text())
}

// dot-atom-text   =       1*atext *("." 1*atext)
fn dot_atom_text() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    atext().repeated().at_least(1).chain(
        just('.')
            .chain(atext().repeated().at_least(1))
            .repeated()
            .flatten(),
    )
}

// qtext           =       NO-WS-CTL / %d33 / %d35-91 / %d93-126
fn qtext() -> impl Parser<char, char, Error = Cheap<char>> {
    choice((
        filter(|c| matches!(u32::from(*c), 33 | 35..=91 | 93..=126)),
        no_ws_ctl(),
        filter(|c: &char| c.len_utf8() > 1),
    ))
}

// quoted-string   =       [CFWS] DQUOTE *([FWS] qcontent) [FWS] DQUOTE [CFWS]
fn quoted_string() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    just('"')
        .ignore_then(
            fws()
                .chain(choice((qtext(), quoted_pair())))
                .repeated()
                .flatten(),
        )
        .then_ignore(text::whitespace())
        .then_ignore(just('"'))
}

// word            =       atom / quoted-string
fn word() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    choice((quoted_string(), atom()))
}

// phrase          =       word *(word / "." / CFWS)
fn phrase() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    word().chain(
        choice((word(), just('.').repeated().exactly(1)))
            .repeated()
            .flatten(),
    )
}

// local-part      =       dot-atom / quoted-string
fn local_part() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    choice((dot_atom(), quoted_string()))
}

// domain          =       dot-atom / domain-literal
fn domain() -> impl Parser<char, Vec<char>, Error = Cheap<char>> {
    choice((
        dot_atom(),
        just('[')
            .chain(filter(|c: &char| *c != ']' && *c != '[').repeated().at_least(1))
            .chain(just(']')),
    ))
}

// addr-spec       =       local-part "@" domain
fn addr_spec() -> impl Parser<char, (String, String), Error = Cheap<char>> {
    local_part()
        .collect()
        .then_ignore(just('@'))
        .then(domain().collect())
}

// angle-addr      =       [CFWS] "<" addr-spec ">" [CFWS]
fn angle_addr() -> impl Parser<char, (String, String), Error = Cheap<char>> {
    addr_spec()
        .delimited_by(just('<').ignored(), just('>').ignored())
        .padded()
}

// name-addr       =       [display-name] angle-addr
fn name_addr() -> impl Parser<char, (Option<String>, (String, String)), Error = Cheap<char>> {
    phrase()
        .collect::<String>()
        .map(|name| name.trim().to_owned())
        .or_not()
        .then(angle_addr())
}

// mailbox         =       name-addr / addr-spec
pub(super) fn mailbox(
) -> impl Parser<char, (Option<String>, (String, String)), Error = Cheap<char>> {
    choice((name_addr(), addr_spec().map(|addr| (None, addr))))
        .padded()
        .then_ignore(end())
}
