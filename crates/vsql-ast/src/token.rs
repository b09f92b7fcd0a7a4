use std::fmt;

use crate::SourceInfo;

/// A single token produced by the tokenizer.
///
/// `text` is the token's text with quoting removed: the contents of a string
/// literal or quoted identifier with doubled quotes collapsed, the digits of
/// a number, or the source spelling of a keyword or operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub info: SourceInfo,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, info: SourceInfo) -> Self {
        Self {
            kind,
            text: text.into(),
            info,
        }
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Token discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Xor,
    Is,
    As,
    Not,
    Null,
    Mod,

    // === Names and literals ===
    /// Bareword identifier.
    Ident,
    /// `"name"` or `[name]`.
    QuotedIdent,
    /// `'text'`.
    String,
    /// Digits with at most one decimal point.
    Number,
    /// `?` positional parameter.
    Question,

    // === Punctuation ===
    LParen,
    RParen,
    Semicolon,
    Comma,
    Dot,

    // === Operators ===
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    /// `!=` or `<>`.
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Pipe,
    /// `||`.
    Concat,

    /// End of input.
    Eof,
}

impl TokenKind {
    /// Whether this kind names something: a bare or quoted identifier.
    #[must_use]
    pub const fn is_identifier(self) -> bool {
        matches!(self, Self::Ident | Self::QuotedIdent)
    }

    #[must_use]
    pub const fn is_keyword(self) -> bool {
        matches!(
            self,
            Self::Select
                | Self::From
                | Self::Where
                | Self::And
                | Self::Or
                | Self::Xor
                | Self::Is
                | Self::As
                | Self::Not
                | Self::Null
                | Self::Mod
        )
    }

    /// Canonical spelling, for diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Xor => "XOR",
            Self::Is => "IS",
            Self::As => "AS",
            Self::Not => "NOT",
            Self::Null => "NULL",
            Self::Mod => "MOD",
            Self::Ident => "identifier",
            Self::QuotedIdent => "quoted identifier",
            Self::String => "string",
            Self::Number => "number",
            Self::Question => "?",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Semicolon => ";",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Pipe => "|",
            Self::Concat => "||",
            Self::Eof => "end of input",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive keyword lookup. `None` means the word is an identifier.
#[must_use]
pub fn lookup_keyword(word: &str) -> Option<TokenKind> {
    let kind = match word.to_ascii_uppercase().as_str() {
        "SELECT" => TokenKind::Select,
        "FROM" => TokenKind::From,
        "WHERE" => TokenKind::Where,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "XOR" => TokenKind::Xor,
        "IS" => TokenKind::Is,
        "AS" => TokenKind::As,
        "NOT" => TokenKind::Not,
        "NULL" => TokenKind::Null,
        "MOD" => TokenKind::Mod,
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(lookup_keyword("select"), Some(TokenKind::Select));
        assert_eq!(lookup_keyword("Mod"), Some(TokenKind::Mod));
        assert_eq!(lookup_keyword("xor"), Some(TokenKind::Xor));
        assert_eq!(lookup_keyword("customers"), None);
    }

    #[test]
    fn kind_classes() {
        assert!(TokenKind::QuotedIdent.is_identifier());
        assert!(!TokenKind::String.is_identifier());
        assert!(TokenKind::Null.is_keyword());
        assert!(!TokenKind::Star.is_keyword());
        assert_eq!(TokenKind::Ne.to_string(), "!=");
    }
}
