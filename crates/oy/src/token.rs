//! Token kinds produced by the scanner.

use std::fmt;

use crate::location::SourceLocation;

/// Every lexeme class the scanner can produce.
///
/// Comments and whitespace are consumed inside the scanner and never
/// surface as tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    Identifier,

    KwAuto,
    KwBool,
    KwBreak,
    KwCase,
    KwContinue,
    KwDefault,
    KwDelete,
    KwDo,
    KwElse,
    KwFalse,
    KwFloat,
    KwFor,
    KwForeach,
    KwIf,
    KwInt,
    KwNull,
    KwRequire,
    KwReturn,
    KwSizeof,
    KwStr,
    KwStruct,
    KwSwitch,
    KwTrace,
    KwTrue,
    KwTypeof,
    KwWhile,

    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Colon,
    Question,
    Dot,
    Ellipsis,

    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Amp,
    Pipe,
    Caret,
    Tilde,
    AmpAmp,
    PipePipe,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    Shl,
    Shr,
    ShlAssign,
    ShrAssign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Not,
    PlusPlus,
    MinusMinus,
}

impl TokenKind {
    /// Maps an identifier spelling to its keyword kind, if it is one.
    #[must_use]
    pub fn keyword(name: &str) -> Option<Self> {
        let kind = match name {
            "auto" => Self::KwAuto,
            "bool" => Self::KwBool,
            "break" => Self::KwBreak,
            "case" => Self::KwCase,
            "continue" => Self::KwContinue,
            "default" => Self::KwDefault,
            "delete" => Self::KwDelete,
            "do" => Self::KwDo,
            "else" => Self::KwElse,
            "false" => Self::KwFalse,
            "float" => Self::KwFloat,
            "for" => Self::KwFor,
            "foreach" => Self::KwForeach,
            "if" => Self::KwIf,
            "int" => Self::KwInt,
            "null" => Self::KwNull,
            "require" => Self::KwRequire,
            "return" => Self::KwReturn,
            "sizeof" => Self::KwSizeof,
            "str" => Self::KwStr,
            "struct" => Self::KwStruct,
            "switch" => Self::KwSwitch,
            "trace" => Self::KwTrace,
            "true" => Self::KwTrue,
            "typeof" => Self::KwTypeof,
            "while" => Self::KwWhile,
            _ => return None,
        };
        Some(kind)
    }

    /// The fixed spelling of a keyword or punctuation kind.
    #[must_use]
    pub fn spelling(self) -> Option<&'static str> {
        self.keyword_spelling().or_else(|| self.punctuation_spelling())
    }

    fn keyword_spelling(self) -> Option<&'static str> {
        let spelling = match self {
            Self::KwAuto => "auto",
            Self::KwBool => "bool",
            Self::KwBreak => "break",
            Self::KwCase => "case",
            Self::KwContinue => "continue",
            Self::KwDefault => "default",
            Self::KwDelete => "delete",
            Self::KwDo => "do",
            Self::KwElse => "else",
            Self::KwFalse => "false",
            Self::KwFloat => "float",
            Self::KwFor => "for",
            Self::KwForeach => "foreach",
            Self::KwIf => "if",
            Self::KwInt => "int",
            Self::KwNull => "null",
            Self::KwRequire => "require",
            Self::KwReturn => "return",
            Self::KwSizeof => "sizeof",
            Self::KwStr => "str",
            Self::KwStruct => "struct",
            Self::KwSwitch => "switch",
            Self::KwTrace => "trace",
            Self::KwTrue => "true",
            Self::KwTypeof => "typeof",
            Self::KwWhile => "while",
            _ => return None,
        };
        Some(spelling)
    }

    fn punctuation_spelling(self) -> Option<&'static str> {
        let spelling = match self {
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Semicolon => ";",
            Self::Colon => ":",
            Self::Question => "?",
            Self::Dot => ".",
            Self::Ellipsis => "...",
            Self::Assign => "=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::PlusAssign => "+=",
            Self::MinusAssign => "-=",
            Self::StarAssign => "*=",
            Self::SlashAssign => "/=",
            Self::PercentAssign => "%=",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::Caret => "^",
            Self::Tilde => "~",
            Self::AmpAmp => "&&",
            Self::PipePipe => "||",
            Self::AmpAssign => "&=",
            Self::PipeAssign => "|=",
            Self::CaretAssign => "^=",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::ShlAssign => "<<=",
            Self::ShrAssign => ">>=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Not => "!",
            Self::PlusPlus => "++",
            Self::MinusMinus => "--",
            _ => return None,
        };
        Some(spelling)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IntegerLiteral => write!(f, "<integer-literal>"),
            Self::FloatLiteral => write!(f, "<floating-point-literal>"),
            Self::StringLiteral => write!(f, "<string-literal>"),
            Self::Identifier => write!(f, "<identifier>"),
            kind => {
                if let Some(spelling) = kind.keyword_spelling() {
                    write!(f, "keyword '{spelling}'")
                } else if let Some(spelling) = kind.punctuation_spelling() {
                    write!(f, "`{spelling}`")
                } else {
                    unreachable!("token kind without a rendering")
                }
            }
        }
    }
}

/// One lexeme with its decoded text and position.
///
/// For string literals `text` holds the decoded contents (escapes resolved,
/// quotes stripped); for every other kind it is the raw spelling.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub location: SourceLocation,
}
