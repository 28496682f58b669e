#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the bench console.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens to build structured
//! command values.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::combinator::opt;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;

use crate::decision::SensitivityProfile;
use crate::sample::{Axis, AxisValue};

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 16;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `us`, `ms` or `s`.
    #[regex(r"[0-9]+(?:us|ms|s)", priority = 2)]
    Duration,
    /// Hexadecimal literal with a `0x` prefix.
    #[regex(r"0[xX][0-9A-Fa-f]+", priority = 3)]
    Hex,
    /// Unsuffixed decimal literal.
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    /// Literal does not fit the argument's range.
    OutOfRange {
        expected: &'static str,
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::OutOfRange { expected, span } => {
                write!(f, "value at {span:?} out of range, expected {expected}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn out_of_range(expected: &'static str, token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::OutOfRange {
                expected,
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];
type GrammarResult<'src, O> = Result<O, ErrMode<GrammarError<'src>>>;

impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    type Inner = Self;

    fn from_input(input: &Input<'src, 'slice>) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn into_inner(self) -> Result<Self::Inner, Self> {
        Ok(self)
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// Advance the controller by a number of ticks (default 1).
    Tick(u32),
    /// Advance the controller by wall-clock time at the configured tick period.
    Run(Duration),
    /// Load a raw 14-bit reading into the emulated sensor.
    Accel(Axis, AxisValue),
    /// Load a raw temperature byte into the emulated sensor.
    Temp(u8),
    Profile(SensitivityProfile),
    Power(bool),
    /// Make the emulated sensor stop acknowledging.
    Nack(bool),
    Status,
    /// Print telemetry recorded since the last `trace`.
    Trace,
    Help(Option<&'a str>),
}

/// Keywords accepted at the start of a line, in help order.
pub const COMMAND_KEYWORDS: [&str; 10] = [
    "tick", "run", "accel", "temp", "profile", "power", "nack", "status", "trace", "help",
];

pub(crate) fn parse_tokens_partial<'src, 'slice>(
    tokens: &'slice [Token<'src>],
) -> Result<(Command<'src>, &'slice [Token<'src>]), GrammarError<'src>>
where
    'src: 'slice,
{
    let mut input = tokens;
    match command(&mut input) {
        Ok(cmd) => Ok((cmd, input)),
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => Err(err),
        Err(ErrMode::Incomplete(_)) => Err(GrammarError::unexpected("token", input.first())),
    }
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        if buffer
            .push(Token {
                kind: record.token,
                lexeme,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        if buffer
            .push(Token {
                kind: TokenKind::Error,
                lexeme: partial.fragment,
                span,
            })
            .is_err()
        {
            return Err(LexError::TooManyTokens {
                processed: buffer.len() + 1,
            });
        }
    }

    Ok(buffer)
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let (command, mut rest) =
        parse_tokens_partial(tokens.as_slice()).map_err(ParseError::Grammar)?;

    while let Some((token, remaining)) = rest.split_first() {
        if token.kind == TokenKind::Eol {
            rest = remaining;
        } else {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(token),
            )));
        }
    }

    Ok(command)
}

fn command<'src>(input: &mut Input<'src, '_>) -> GrammarResult<'src, Command<'src>> {
    let snapshot = *input;
    let keyword = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;
    let word = keyword.lexeme;

    if word.eq_ignore_ascii_case("tick") {
        let count = opt(number::<u32>("tick count")).parse_next(input)?;
        Ok(Command::Tick(count.unwrap_or(1)))
    } else if word.eq_ignore_ascii_case("run") {
        let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
        parse_duration(&token).map(Command::Run).map_err(ErrMode::Cut)
    } else if word.eq_ignore_ascii_case("accel") {
        let axis = axis(input)?;
        let token = expect_number(input, "axis reading")?;
        let raw = literal::<u16>(&token)
            .filter(|raw| *raw <= AxisValue::MAX)
            .ok_or_else(|| ErrMode::Cut(GrammarError::out_of_range("0..=16383", &token)))?;
        Ok(Command::Accel(axis, AxisValue::new(raw)))
    } else if word.eq_ignore_ascii_case("temp") {
        let token = expect_number(input, "temperature byte")?;
        let raw = literal::<u8>(&token)
            .ok_or_else(|| ErrMode::Cut(GrammarError::out_of_range("0..=255", &token)))?;
        Ok(Command::Temp(raw))
    } else if word.eq_ignore_ascii_case("profile") {
        profile(input).map(Command::Profile)
    } else if word.eq_ignore_ascii_case("power") {
        on_off(input).map(Command::Power)
    } else if word.eq_ignore_ascii_case("nack") {
        on_off(input).map(Command::Nack)
    } else if word.eq_ignore_ascii_case("status") {
        Ok(Command::Status)
    } else if word.eq_ignore_ascii_case("trace") {
        Ok(Command::Trace)
    } else if word.eq_ignore_ascii_case("help") {
        let topic = opt(expect_kind(TokenKind::Ident, "topic")).parse_next(input)?;
        Ok(Command::Help(topic.map(|token| token.lexeme)))
    } else {
        *input = snapshot;
        Err(ErrMode::Backtrack(GrammarError::unexpected(
            "command keyword",
            Some(&keyword),
        )))
    }
}

fn axis<'src>(input: &mut Input<'src, '_>) -> GrammarResult<'src, Axis> {
    let token = expect_kind(TokenKind::Ident, "axis").parse_next(input)?;
    match token.lexeme {
        x if x.eq_ignore_ascii_case("x") => Ok(Axis::X),
        y if y.eq_ignore_ascii_case("y") => Ok(Axis::Y),
        z if z.eq_ignore_ascii_case("z") => Ok(Axis::Z),
        _ => Err(ErrMode::Cut(GrammarError::unexpected("x, y or z", Some(&token)))),
    }
}

fn profile<'src>(input: &mut Input<'src, '_>) -> GrammarResult<'src, SensitivityProfile> {
    let token = expect_kind(TokenKind::Ident, "profile").parse_next(input)?;
    [
        ("off", SensitivityProfile::Disabled),
        ("low", SensitivityProfile::Low),
        ("medium", SensitivityProfile::Medium),
        ("high", SensitivityProfile::High),
    ]
    .into_iter()
    .find(|(name, _)| name.eq_ignore_ascii_case(token.lexeme))
    .map(|(_, profile)| profile)
    .ok_or_else(|| {
        ErrMode::Cut(GrammarError::unexpected(
            "off, low, medium or high",
            Some(&token),
        ))
    })
}

fn on_off<'src>(input: &mut Input<'src, '_>) -> GrammarResult<'src, bool> {
    let token = expect_kind(TokenKind::Ident, "on or off").parse_next(input)?;
    if token.lexeme.eq_ignore_ascii_case("on") {
        Ok(true)
    } else if token.lexeme.eq_ignore_ascii_case("off") {
        Ok(false)
    } else {
        Err(ErrMode::Cut(GrammarError::unexpected("on or off", Some(&token))))
    }
}

fn expect_number<'src>(
    input: &mut Input<'src, '_>,
    label: &'static str,
) -> GrammarResult<'src, Token<'src>> {
    match input.split_first() {
        Some((token, rest)) if matches!(token.kind, TokenKind::Integer | TokenKind::Hex) => {
            *input = rest;
            Ok(token.clone())
        }
        other => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            other.map(|(token, _)| token),
        ))),
    }
}

/// Decimal number argument, cut on overflow.
fn number<'src, 'slice, T>(
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, T, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
    T: LiteralValue,
{
    move |input: &mut Input<'src, 'slice>| {
        let token = expect_number(input, label)?;
        literal::<T>(&token).ok_or_else(|| ErrMode::Cut(GrammarError::out_of_range(label, &token)))
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, ErrMode<GrammarError<'src>>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

/// Unsigned types a numeric literal can be read into.
pub trait LiteralValue: Sized {
    fn from_str_radix(text: &str, radix: u32) -> Option<Self>;
}

macro_rules! literal_value {
    ($($ty:ty),*) => {
        $(impl LiteralValue for $ty {
            fn from_str_radix(text: &str, radix: u32) -> Option<Self> {
                <$ty>::from_str_radix(text, radix).ok()
            }
        })*
    };
}

literal_value!(u8, u16, u32);

fn literal<T: LiteralValue>(token: &Token<'_>) -> Option<T> {
    match token.kind {
        TokenKind::Hex => T::from_str_radix(&token.lexeme[2..], 16),
        TokenKind::Integer => T::from_str_radix(token.lexeme, 10),
        _ => None,
    }
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    let parse = |digits: &str| {
        digits
            .parse::<u64>()
            .map_err(|_| GrammarError::invalid_duration(token))
    };
    if let Some(rest) = text.strip_suffix("us") {
        Ok(Duration::from_micros(parse(rest)?))
    } else if let Some(rest) = text.strip_suffix("ms") {
        Ok(Duration::from_millis(parse(rest)?))
    } else if let Some(rest) = text.strip_suffix('s') {
        Ok(Duration::from_secs(parse(rest)?))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}
