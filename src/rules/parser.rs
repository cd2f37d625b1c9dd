//! Recursive-descent parser over the rule token stream.

use super::lexer::{Token, TokenKind};
use super::tree::{RuleObject, RuleValue};
use super::RuleError;

pub struct RuleParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source_len: usize,
    /// Event kind the rule belongs to, used in warnings only
    kind: &'a str,
}

impl<'a> RuleParser<'a> {
    pub fn new(tokens: &'a [Token], source_len: usize, kind: &'a str) -> Self {
        Self {
            tokens,
            pos: 0,
            source_len,
            kind,
        }
    }

    /// Parse a complete document: one value and nothing after it.
    pub fn parse_document(&mut self) -> Result<RuleValue, RuleError> {
        let value = self.parse_value()?;
        if let Some(extra) = self.peek() {
            return Err(RuleError::syntax(
                extra.offset,
                format!("unexpected {} after end of rule", extra.kind.describe()),
            ));
        }
        Ok(value)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_offset(&self) -> usize {
        self.source_len
    }

    pub fn parse_value(&mut self) -> Result<RuleValue, RuleError> {
        let token = match self.next() {
            Some(t) => t,
            None => {
                return Err(RuleError::syntax(
                    self.end_offset(),
                    "unexpected end of rule, expected a value",
                ))
            }
        };

        match &token.kind {
            TokenKind::LBrace => self.parse_object().map(RuleValue::Object),
            TokenKind::LBracket => self.parse_array(),
            TokenKind::Regex(p) => Ok(RuleValue::Pattern(p.clone())),
            TokenKind::Type(t) => Ok(RuleValue::Type(*t)),
            TokenKind::Quoted(s) | TokenKind::Bare(s) => Ok(RuleValue::from_text(s.clone())),
            other => Err(RuleError::syntax(
                token.offset,
                format!("unexpected {}, expected a value", other.describe()),
            )),
        }
    }

    /// Called after `{` has been consumed.
    fn parse_object(&mut self) -> Result<RuleObject, RuleError> {
        let mut object = RuleObject::new();

        loop {
            match self.peek().map(|t| &t.kind) {
                None => {
                    return Err(RuleError::syntax(
                        self.end_offset(),
                        "unterminated object, expected '}'",
                    ))
                }
                Some(TokenKind::RBrace) => {
                    self.pos += 1;
                    return Ok(object);
                }
                Some(TokenKind::Comma) => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            let key_offset = self.peek().map(|t| t.offset).unwrap_or(self.source_len);
            let key = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Quoted(s)) | Some(TokenKind::Bare(s)) => {
                    self.pos += 1;
                    s.clone()
                }
                _ => {
                    let value = self.parse_value()?;
                    log::warn!(
                        "Rule for '{}' has a non-string key {} at offset {} - the configuration likely contains a malformed rule",
                        self.kind,
                        value,
                        key_offset
                    );
                    value.to_string()
                }
            };

            match self.next() {
                Some(Token {
                    kind: TokenKind::Colon,
                    ..
                }) => {}
                Some(t) => {
                    return Err(RuleError::syntax(
                        t.offset,
                        format!("expected ':' after key '{}', found {}", key, t.kind.describe()),
                    ))
                }
                None => {
                    return Err(RuleError::syntax(
                        self.end_offset(),
                        format!("expected ':' after key '{}'", key),
                    ))
                }
            }

            let value = self.parse_value()?;
            object.insert(key, value);

            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Comma) | Some(TokenKind::RBrace) | None => {}
                Some(other) => {
                    let offset = self.tokens[self.pos].offset;
                    return Err(RuleError::syntax(
                        offset,
                        format!("expected ',' or '}}', found {}", other.describe()),
                    ));
                }
            }
        }
    }

    /// Called after `[` has been consumed.
    fn parse_array(&mut self) -> Result<RuleValue, RuleError> {
        let mut items = Vec::new();

        loop {
            match self.peek().map(|t| &t.kind) {
                None => {
                    return Err(RuleError::syntax(
                        self.end_offset(),
                        "unterminated list, expected ']'",
                    ))
                }
                Some(TokenKind::RBracket) => {
                    self.pos += 1;
                    return Ok(RuleValue::Array(items));
                }
                Some(TokenKind::Comma) => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            items.push(self.parse_value()?);

            match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Comma) | Some(TokenKind::RBracket) | None => {}
                Some(other) => {
                    let offset = self.tokens[self.pos].offset;
                    return Err(RuleError::syntax(
                        offset,
                        format!("expected ',' or ']', found {}", other.describe()),
                    ));
                }
            }
        }
    }
}
