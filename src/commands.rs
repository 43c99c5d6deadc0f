//! The command language bound to keys and buttons.
//!
//! ```text
//! command := "quit" | "close"
//!          | "focus" target | "move" target
//!          | "fullscreen" ("enable" | "disable" | "toggle")
//!          | "layout" ("tabbed" | "split") [ "horizontal" | "vertical" | "toggle" ]
//! target  := direction
//!          | "workspace" ( "next" | "previous" | "back-and-forth" | string | integer )
//!          | "output" ( "left" | "right" | "top" | "bottom" | string )
//! ```
//!
//! Keywords are case-insensitive. A command is parsed once, when the
//! configuration is loaded, and invoked any number of times afterwards.

use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use strum::{EnumString, VariantNames};
use thiserror::Error;
use tracing::warn;

use crate::layout_engine::{Direction, LayoutKind, Orientation, StateChange, Target};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Quit,
    Close,
    Fullscreen(StateChange),
    FocusDirection(Direction),
    FocusWorkspace(Target),
    FocusWorkspaceName(String),
    FocusWorkspaceNumber(u64),
    FocusOutput(Direction),
    FocusOutputName(String),
    MoveDirection(Direction),
    MoveToWorkspace(Target),
    MoveToWorkspaceName(String),
    MoveToWorkspaceNumber(u64),
    MoveWorkspaceToOutput(Direction),
    MoveWorkspaceToOutputName(String),
    /// `orientation` is `None` for "toggle".
    LayoutSwitch {
        kind: LayoutKind,
        orientation: Option<Orientation>,
    },
}

/// What an operation is invoked against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Receiver {
    Root,
    Workspaces,
    FocusedSurface,
}

impl Operation {
    pub fn receiver(&self) -> Receiver {
        use Operation::*;
        match self {
            Quit => Receiver::Root,
            Close | Fullscreen(_) => Receiver::FocusedSurface,
            _ => Receiver::Workspaces,
        }
    }
}

/// A parsed command, keeping the text it was parsed from.
#[derive(Clone, Debug, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub struct Command {
    text: String,
    operation: Operation,
}

impl Command {
    pub fn operation(&self) -> &Operation { &self.operation }

    pub fn text(&self) -> &str { &self.text }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.text) }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let operation = Parser::new(text).command()?;
        Ok(Command { text: text.trim().to_owned(), operation })
    }
}

/// Parses `text`, logging it when it is not a valid command.
pub fn parse_command(text: &str) -> Result<Command, ParseError> {
    text.parse().inspect_err(|err| warn!(%text, %err, "invalid command"))
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown symbol `{found}`, expected one of: {}", .expected.join(", "))]
    UnknownSymbol {
        found: String,
        expected: &'static [&'static str],
    },
    #[error("unexpected end of command, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
    },
    #[error("unexpected {found} after the end of the command")]
    TrailingInput { found: String },
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("invalid character `{0}`")]
    InvalidCharacter(char),
    #[error("integer out of range: {0}")]
    IntegerOverflow(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Symbol(String),
    Str(String),
    Int(u64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Symbol(s) => write!(f, "symbol `{s}`"),
            Token::Str(s) => write!(f, "string {s:?}"),
            Token::Int(n) => write!(f, "integer {n}"),
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self { Lexer { src, chars: src.char_indices().peekable() } }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_blank();
        let Some(&(start, c)) = self.chars.peek() else { return Ok(None) };
        let token = match c {
            c if c.is_ascii_alphabetic() || c == '_' => {
                let end = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
                Token::Symbol(self.src[start..end].to_owned())
            }
            c if c.is_ascii_digit() => {
                let end = self.take_while(|c| c.is_ascii_digit());
                let digits = &self.src[start..end];
                let n = digits.parse().map_err(|_| ParseError::IntegerOverflow(digits.into()))?;
                Token::Int(n)
            }
            '"' | '\'' => Token::Str(self.string(start, c)?),
            c => return Err(ParseError::InvalidCharacter(c)),
        };
        Ok(Some(token))
    }

    fn skip_blank(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c == '#' {
                while self.chars.next_if(|&(_, c)| c != '\n').is_some() {}
            } else if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    /// Consumes characters matching `pred` and returns the end offset.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> usize {
        while self.chars.next_if(|&(_, c)| pred(c)).is_some() {}
        self.chars.peek().map_or(self.src.len(), |&(i, _)| i)
    }

    /// Double-quoted strings support escapes, single-quoted ones are literal.
    fn string(&mut self, start: usize, quote: char) -> Result<String, ParseError> {
        self.chars.next();
        let mut out = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(ParseError::UnterminatedString(start));
            };
            match c {
                c if c == quote => return Ok(out),
                '\\' if quote == '"' => match self.chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, c)) => out.push(c),
                    None => return Err(ParseError::UnterminatedString(start)),
                },
                c => out.push(c),
            }
        }
    }
}

#[derive(Clone, Copy, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum Keyword {
    Quit,
    Close,
    Focus,
    Move,
    Fullscreen,
    Layout,
}

#[derive(Clone, Copy, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum TargetWord {
    Left,
    Right,
    Top,
    Bottom,
    Parent,
    Child,
    Workspace,
    Output,
}

#[derive(Clone, Copy, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum CrossDirection {
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Clone, Copy, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
enum OrientationWord {
    Horizontal,
    Vertical,
    Toggle,
}

enum Parsed {
    Direction(Direction),
    Workspace(Target),
    WorkspaceName(String),
    WorkspaceNumber(u64),
    Output(Direction),
    OutputName(String),
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self { Parser { lexer: Lexer::new(src) } }

    fn command(mut self) -> Result<Operation, ParseError> {
        let operation = match self.symbol::<Keyword>("a command")? {
            Keyword::Quit => Operation::Quit,
            Keyword::Close => Operation::Close,
            Keyword::Focus => match self.target()? {
                Parsed::Direction(d) => Operation::FocusDirection(d),
                Parsed::Workspace(t) => Operation::FocusWorkspace(t),
                Parsed::WorkspaceName(n) => Operation::FocusWorkspaceName(n),
                Parsed::WorkspaceNumber(n) => Operation::FocusWorkspaceNumber(n),
                Parsed::Output(d) => Operation::FocusOutput(d),
                Parsed::OutputName(n) => Operation::FocusOutputName(n),
            },
            Keyword::Move => match self.target()? {
                Parsed::Direction(d) => Operation::MoveDirection(d),
                Parsed::Workspace(t) => Operation::MoveToWorkspace(t),
                Parsed::WorkspaceName(n) => Operation::MoveToWorkspaceName(n),
                Parsed::WorkspaceNumber(n) => Operation::MoveToWorkspaceNumber(n),
                Parsed::Output(d) => Operation::MoveWorkspaceToOutput(d),
                Parsed::OutputName(n) => Operation::MoveWorkspaceToOutputName(n),
            },
            Keyword::Fullscreen => Operation::Fullscreen(self.symbol("a state change")?),
            Keyword::Layout => {
                let kind = self.symbol("a layout type")?;
                let orientation = match self.lexer.next_token()? {
                    None => None,
                    Some(token) => match self.resolve::<OrientationWord>(token, "an orientation")? {
                        OrientationWord::Horizontal => Some(Orientation::Horizontal),
                        OrientationWord::Vertical => Some(Orientation::Vertical),
                        OrientationWord::Toggle => None,
                    },
                };
                Operation::LayoutSwitch { kind, orientation }
            }
        };
        match self.lexer.next_token()? {
            None => Ok(operation),
            Some(token) => Err(ParseError::TrailingInput { found: token.to_string() }),
        }
    }

    fn target(&mut self) -> Result<Parsed, ParseError> {
        let direction = match self.symbol::<TargetWord>("a target")? {
            TargetWord::Left => Direction::Left,
            TargetWord::Right => Direction::Right,
            TargetWord::Top => Direction::Top,
            TargetWord::Bottom => Direction::Bottom,
            TargetWord::Parent => Direction::Parent,
            TargetWord::Child => Direction::Child,
            TargetWord::Workspace => {
                const EXPECTED: &str = "a workspace target, name or number";
                return match self.expect(EXPECTED)? {
                    Token::Str(name) => Ok(Parsed::WorkspaceName(name)),
                    Token::Int(number) => Ok(Parsed::WorkspaceNumber(number)),
                    token => Ok(Parsed::Workspace(self.resolve(token, EXPECTED)?)),
                };
            }
            TargetWord::Output => {
                const EXPECTED: &str = "an output direction or name";
                return match self.expect(EXPECTED)? {
                    Token::Str(name) => Ok(Parsed::OutputName(name)),
                    token => {
                        let direction = match self.resolve::<CrossDirection>(token, EXPECTED)? {
                            CrossDirection::Left => Direction::Left,
                            CrossDirection::Right => Direction::Right,
                            CrossDirection::Top => Direction::Top,
                            CrossDirection::Bottom => Direction::Bottom,
                        };
                        Ok(Parsed::Output(direction))
                    }
                };
            }
        };
        Ok(Parsed::Direction(direction))
    }

    fn expect(&mut self, expected: &'static str) -> Result<Token, ParseError> {
        self.lexer.next_token()?.ok_or(ParseError::UnexpectedEnd { expected })
    }

    fn symbol<T: FromStr + VariantNames>(&mut self, expected: &'static str) -> Result<T, ParseError> {
        let token = self.expect(expected)?;
        self.resolve(token, expected)
    }

    /// Resolves a token against the vocabulary of `T`.
    fn resolve<T: FromStr + VariantNames>(
        &self,
        token: Token,
        expected: &'static str,
    ) -> Result<T, ParseError> {
        match token {
            Token::Symbol(s) => T::from_str(&s).map_err(|_| ParseError::UnknownSymbol {
                found: s,
                expected: T::VARIANTS,
            }),
            token => Err(ParseError::UnexpectedToken { found: token.to_string(), expected }),
        }
    }
}
