//! Lexer, recursive-descent parser, and evaluator for version-range
//! expressions (`^1.2.3`, `~1.2.3`, `1.0.0 - 2.0.0`, `>=1.0.0 <2.0.0 || >=3.0.0`, `1.2.*`).
//!
//! See SPEC_FULL.md §4.4. The AST is an immutable tree behind an `Rc` root so
//! `Range` clones are cheap, per the invariant in spec.md §3.

use std::rc::Rc;

use crate::error::ZepoError;
use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    Caret,
    Tilde,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Version(String),
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    Hyphen,
    Tilde,
    Caret,
    Or,
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_digit() || c == '.' || c == '-' || c.is_ascii_alphabetic() || c == '*' || c == '+'
}

struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn lex_error(&self, position: usize, message: impl Into<String>) -> ZepoError {
        ZepoError::Lex {
            position,
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ZepoError> {
        loop {
            let Some(c) = self.peek() else {
                return Ok(None);
            };

            if c.is_whitespace() {
                self.advance();
                continue;
            }

            let start = self.pos;

            if c == '^' {
                self.advance();
                return Ok(Some(Token::Caret));
            }

            if c == '~' {
                self.advance();
                return Ok(Some(Token::Tilde));
            }

            if c == '=' {
                self.advance();
                return Ok(Some(Token::Eq));
            }

            if c == '|' {
                self.advance();
                if self.peek() != Some('|') {
                    return Err(self.lex_error(self.pos, "expected second '|' to form '||'"));
                }
                self.advance();
                return Ok(Some(Token::Or));
            }

            if c == '>' {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    return Ok(Some(Token::GtEq));
                }
                return Ok(Some(Token::Gt));
            }

            if c == '<' {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    return Ok(Some(Token::LtEq));
                }
                return Ok(Some(Token::Lt));
            }

            if c == '*' || c.is_ascii_digit() || c == 'v' || c == 'V' {
                if c == 'v' || c == 'V' {
                    self.advance();
                    match self.peek() {
                        Some(next) if is_version_char(next) => {}
                        _ => return Err(self.lex_error(self.pos, "expected version after 'v'")),
                    }
                }

                let begin = start;
                let mut in_prerelease_channel = false;

                while let Some(ch) = self.peek() {
                    if !is_version_char(ch) {
                        break;
                    }

                    if ch == '-' {
                        if in_prerelease_channel {
                            return Err(
                                self.lex_error(self.pos, "unexpected second '-' in version")
                            );
                        }
                        in_prerelease_channel = true;
                    }

                    if ch == '+' && !in_prerelease_channel {
                        return Err(self.lex_error(self.pos, "'+' only legal in pre-release channel"));
                    }

                    if ch == '*' && in_prerelease_channel {
                        return Err(self.lex_error(self.pos, "'*' only legal outside pre-release channel"));
                    }

                    self.advance();
                }

                return Ok(Some(Token::Version(self.input[begin..self.pos].to_string())));
            }

            if c == '-' {
                self.advance();
                return Ok(Some(Token::Hyphen));
            }

            return Err(self.lex_error(start, format!("invalid character '{c}'")));
        }
    }

    fn position(&self) -> usize {
        let _ = self.bytes;
        self.pos
    }
}

/// Wildcard-allowing predicate on version components; a missing (`None`)
/// component means "any".
#[derive(Debug, Clone)]
pub struct VersionPattern {
    pub major: Option<u64>,
    pub minor: Option<u64>,
    pub patch: Option<u64>,
}

impl VersionPattern {
    fn parse(literal: &str, position: usize) -> Result<Self, ZepoError> {
        let mut parts = literal.split('.');
        let parse_component = |s: &str| -> Result<Option<u64>, ZepoError> {
            if s == "*" || s.is_empty() {
                Ok(None)
            } else {
                s.parse::<u64>()
                    .map(Some)
                    .map_err(|_| ZepoError::Parse {
                        position,
                        message: format!("invalid version component \"{s}\""),
                    })
            }
        };

        let major = parts.next().map(parse_component).transpose()?.flatten();
        let minor = parts.next().map(parse_component).transpose()?.flatten();
        let patch = parts.next().map(parse_component).transpose()?.flatten();

        Ok(VersionPattern { major, minor, patch })
    }

    fn satisfies(&self, v: &Version) -> bool {
        if let Some(major) = self.major {
            if major != v.major {
                return false;
            }
        }
        if let Some(minor) = self.minor {
            if minor != v.minor {
                return false;
            }
        }
        if let Some(patch) = self.patch {
            if patch != v.patch {
                return false;
            }
        }
        true
    }

    /// Concrete floor version for this pattern (missing components become 0),
    /// used when a pattern is the left endpoint of a hyphen range.
    fn floor(&self) -> Version {
        Version {
            major: self.major.unwrap_or(0),
            minor: self.minor.unwrap_or(0),
            patch: self.patch.unwrap_or(0),
            pre_release: Vec::new(),
            build: Vec::new(),
        }
    }
}

#[derive(Debug)]
enum RangeNode {
    VersionPattern(VersionPattern),
    Hyphen(Version, Version),
    Compare(CompareOp, Version),
    And(Rc<RangeNode>, Rc<RangeNode>),
    Or(Rc<RangeNode>, Rc<RangeNode>),
}

impl RangeNode {
    fn satisfies(&self, v: &Version) -> bool {
        match self {
            RangeNode::VersionPattern(p) => p.satisfies(v),
            RangeNode::Hyphen(from, to) => v >= from && v <= to,
            RangeNode::Compare(op, target) => satisfies_compare(*op, v, target),
            RangeNode::And(l, r) => l.satisfies(v) && r.satisfies(v),
            RangeNode::Or(l, r) => l.satisfies(v) || r.satisfies(v),
        }
    }
}

fn satisfies_compare(op: CompareOp, v: &Version, target: &Version) -> bool {
    match op {
        CompareOp::Lt => v < target,
        CompareOp::LtEq => v <= target,
        CompareOp::Gt => v > target,
        CompareOp::GtEq => v >= target,
        CompareOp::Eq => v == target,
        CompareOp::Caret => satisfies_caret(v, target),
        CompareOp::Tilde => satisfies_tilde(v, target),
    }
}

/// `^` — compatible changes that do not modify the leftmost non-zero component.
fn satisfies_caret(v: &Version, target: &Version) -> bool {
    if v < target {
        return false;
    }

    if target.major > 0 {
        v.major == target.major
    } else if target.minor > 0 {
        v.major == 0 && v.minor == target.minor
    } else {
        v.major == 0 && v.minor == 0 && v.patch == target.patch
    }
}

/// `~` — patch-level changes within the same major.minor.
fn satisfies_tilde(v: &Version, target: &Version) -> bool {
    v >= target && v.major == target.major && v.minor == target.minor
}

/// A compiled, immutable, cheaply-cloneable range expression.
#[derive(Debug, Clone)]
pub struct Range {
    root: Rc<RangeNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Comparison,
    Union,
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ZepoError> {
        let mut lexer = Lexer::new(input);
        let lookahead = lexer.next_token()?;
        Ok(Self { lexer, lookahead })
    }

    fn bump(&mut self) -> Result<Option<Token>, ZepoError> {
        let current = self.lookahead.take();
        self.lookahead = self.lexer.next_token()?;
        Ok(current)
    }

    fn parse_range(&mut self) -> Result<Rc<RangeNode>, ZepoError> {
        let mut current: Option<Rc<RangeNode>> = None;
        let mut level = Level::Comparison;

        loop {
            let Some(token) = self.lookahead.clone() else {
                break;
            };

            if level == Level::Comparison {
                let compare_op = match token {
                    Token::Caret => Some(CompareOp::Caret),
                    Token::Tilde => Some(CompareOp::Tilde),
                    Token::Gt => Some(CompareOp::Gt),
                    Token::GtEq => Some(CompareOp::GtEq),
                    Token::Lt => Some(CompareOp::Lt),
                    Token::LtEq => Some(CompareOp::LtEq),
                    Token::Eq => Some(CompareOp::Eq),
                    _ => None,
                };

                if let Some(op) = compare_op {
                    self.bump()?;
                    let position = self.lexer.position();
                    let version_literal = match self.bump()? {
                        Some(Token::Version(lit)) => lit,
                        _ => {
                            return Err(ZepoError::Parse {
                                position,
                                message: "expected version literal after comparison operator".into(),
                            })
                        }
                    };

                    let target = Version::parse(&version_literal)?;
                    let node = Rc::new(RangeNode::Compare(op, target));
                    current = Some(combine_and(current, node));
                    continue;
                }

                if let Token::Version(lit) = token {
                    self.bump()?;
                    let position = self.lexer.position();
                    let pattern = VersionPattern::parse(&lit, position)?;
                    current = Some(combine_and(current, Rc::new(RangeNode::VersionPattern(pattern))));
                    continue;
                }

                if token == Token::Hyphen {
                    self.bump()?;
                    let position = self.lexer.position();

                    let from_pattern = match current.as_deref() {
                        Some(RangeNode::VersionPattern(p)) => p.floor(),
                        _ => {
                            return Err(ZepoError::Parse {
                                position,
                                message: "'-' must follow a version".into(),
                            })
                        }
                    };

                    let to_literal = match self.bump()? {
                        Some(Token::Version(lit)) => lit,
                        _ => {
                            return Err(ZepoError::Parse {
                                position,
                                message: "expected version literal after '-'".into(),
                            })
                        }
                    };

                    let to_pattern = VersionPattern::parse(&to_literal, position)?;
                    current = Some(Rc::new(RangeNode::Hyphen(from_pattern, to_pattern.floor())));
                    continue;
                }
            }

            if token == Token::Or {
                self.bump()?;
                level = Level::Union;
                let right = self.parse_range()?;
                let left = current.take().ok_or(ZepoError::Parse {
                    position: self.lexer.position(),
                    message: "unexpected '||' with no left-hand expression".into(),
                })?;
                current = Some(Rc::new(RangeNode::Or(left, right)));
                continue;
            }

            break;
        }

        current.ok_or(ZepoError::Parse {
            position: self.lexer.position(),
            message: "unexpected EOF".into(),
        })
    }
}

fn combine_and(current: Option<Rc<RangeNode>>, node: Rc<RangeNode>) -> Rc<RangeNode> {
    match current {
        Some(left) => Rc::new(RangeNode::And(left, node)),
        None => node,
    }
}

impl Range {
    pub fn parse(expression: &str) -> Result<Self, ZepoError> {
        let mut parser = Parser::new(expression)?;
        let root = parser.parse_range()?;
        Ok(Range { root })
    }

    pub fn satisfies(&self, version: &Version) -> bool {
        self.root.satisfies(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn caret_range() {
        let r = Range::parse("^1.2.3").unwrap();
        assert!(r.satisfies(&v("1.9.0")));
        assert!(!r.satisfies(&v("2.0.0")));
    }

    #[test]
    fn tilde_range() {
        let r = Range::parse("~1.2.3").unwrap();
        assert!(r.satisfies(&v("1.2.9")));
        assert!(!r.satisfies(&v("1.3.0")));
    }

    #[test]
    fn hyphen_range() {
        let r = Range::parse("1.0.0 - 2.0.0").unwrap();
        assert!(r.satisfies(&v("1.5.0")));
        assert!(!r.satisfies(&v("2.0.1")));
    }

    #[test]
    fn disjunction() {
        let r = Range::parse(">=1.0.0 <2.0.0 || >=3.0.0").unwrap();
        assert!(!r.satisfies(&v("2.5.0")));
        assert!(r.satisfies(&v("3.1.0")));
    }

    #[test]
    fn wildcard() {
        let r = Range::parse("1.2.*").unwrap();
        assert!(r.satisfies(&v("1.2.99")));
        assert!(!r.satisfies(&v("1.3.0")));
    }

    #[test]
    fn lexer_rejects_lone_pipe() {
        let err = Range::parse("|1.0.0").unwrap_err();
        match err {
            ZepoError::Lex { position, .. } => assert_eq!(position, 1),
            other => panic!("expected LexError, got {other:?}"),
        }
    }

    #[test]
    fn determinism_is_not_influenced_by_global_state() {
        let r1 = Range::parse(">=1.0.0 <2.0.0").unwrap();
        let r2 = Range::parse(">=1.0.0 <2.0.0").unwrap();
        for candidate in ["0.9.0", "1.0.0", "1.9.9", "2.0.0"] {
            let version = v(candidate);
            assert_eq!(r1.satisfies(&version), r2.satisfies(&version));
        }
    }
}
