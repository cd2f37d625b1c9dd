//! Tokenizer for validation rule source text.

use super::tree::TypeTag;
use super::RuleError;

/// A lexical token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    /// `/pattern/` with `\/` already unescaped
    Regex(String),
    /// `<int>`, `<float>` or `<str>`
    Type(TypeTag),
    /// Quoted string with quotes stripped and escapes resolved
    Quoted(String),
    /// Anything else up to whitespace or a structural character
    Bare(String),
}

impl TokenKind {
    /// Short human-readable name used in syntax errors
    pub fn describe(&self) -> String {
        match self {
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Regex(p) => format!("regex /{}/", p),
            TokenKind::Type(t) => format!("type {}", t),
            TokenKind::Quoted(s) => format!("string \"{}\"", s),
            TokenKind::Bare(s) => format!("word '{}'", s),
        }
    }
}

fn is_structural(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | ':' | ',' | '"' | '\'')
}

/// Split rule source into tokens in a single left-to-right pass.
pub fn tokenize(source: &str) -> Result<Vec<Token>, RuleError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        let kind = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '{' | '}' | '[' | ']' | ':' | ',' => {
                chars.next();
                match ch {
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    ':' => TokenKind::Colon,
                    _ => TokenKind::Comma,
                }
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, escaped)) if escaped == ch || escaped == '\\' => {
                                value.push(escaped)
                            }
                            Some((_, other)) => {
                                value.push('\\');
                                value.push(other);
                            }
                            None => break,
                        },
                        c if c == ch => {
                            closed = true;
                            break;
                        }
                        c => value.push(c),
                    }
                }
                if !closed {
                    return Err(RuleError::syntax(offset, "unterminated quoted string"));
                }
                TokenKind::Quoted(value)
            }
            '/' => {
                chars.next();
                let mut pattern = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, '/')) => pattern.push('/'),
                            Some((_, other)) => {
                                pattern.push('\\');
                                pattern.push(other);
                            }
                            None => pattern.push('\\'),
                        },
                        '/' => {
                            closed = true;
                            break;
                        }
                        c => pattern.push(c),
                    }
                }
                if !closed {
                    return Err(RuleError::syntax(offset, "unterminated regex literal"));
                }
                if let Err(e) = regex::Regex::new(&pattern) {
                    let first = e.to_string();
                    let first = first.lines().last().unwrap_or("").trim().to_string();
                    return Err(RuleError::syntax(
                        offset,
                        format!("invalid regex /{}/: {}", pattern, first),
                    ));
                }
                TokenKind::Regex(pattern)
            }
            '<' => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '>' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(RuleError::syntax(offset, "unterminated type literal"));
                }
                match TypeTag::from_name(&name) {
                    Some(tag) => TokenKind::Type(tag),
                    None => {
                        return Err(RuleError::syntax(
                            offset,
                            format!("unknown type <{}>, expected one of <int>, <float>, <str>", name),
                        ))
                    }
                }
            }
            _ => {
                let mut word = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_whitespace() || is_structural(c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                TokenKind::Bare(word)
            }
        };
        tokens.push(Token { kind, offset });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_structural_and_literals() {
        let tokens = kinds(r#"{ !event: "purchase", value: <FLOAT>, id: /^[0-9]+$/, items: [] }"#);
        assert_eq!(
            tokens,
            vec![
                TokenKind::LBrace,
                TokenKind::Bare("!event".into()),
                TokenKind::Colon,
                TokenKind::Quoted("purchase".into()),
                TokenKind::Comma,
                TokenKind::Bare("value".into()),
                TokenKind::Colon,
                TokenKind::Type(TypeTag::Float),
                TokenKind::Comma,
                TokenKind::Bare("id".into()),
                TokenKind::Colon,
                TokenKind::Regex("^[0-9]+$".into()),
                TokenKind::Comma,
                TokenKind::Bare("items".into()),
                TokenKind::Colon,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::RBrace,
            ]
        );
    }

    #[test]
    fn test_quoted_escapes() {
        assert_eq!(
            kinds(r#""say \"hi\" \\ now" 'it\'s'"#),
            vec![
                TokenKind::Quoted(r#"say "hi" \ now"#.into()),
                TokenKind::Quoted("it's".into()),
            ]
        );
    }

    #[test]
    fn test_escaped_slash_in_regex() {
        assert_eq!(
            kinds(r"/https:\/\/shop\.example\/.*/"),
            vec![TokenKind::Regex(r"https://shop\.example/.*".into())]
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            tokenize("{ a: /abc }"),
            Err(RuleError::Syntax { offset: 5, .. })
        ));
        assert!(tokenize("{ a: /(unclosed/ }").is_err());
        assert!(tokenize("{ a: <int }").is_err());
        assert!(tokenize("{ a: <date> }").is_err());
        assert!(tokenize(r#"{ a: "open }"#).is_err());
    }
}
