use std::fmt::Display;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Punctuator {
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    OpenCurly,
    CloseCurly,
    Dot,
    Arrow,
    Increment,
    Decrement,
    Ampersand,
    Multiply,
    Add,
    Subtract,
    BitComplement,
    Not,
    Divide,
    Modulus,
    LeftShift,
    RightShift,
    LessThan,
    GreaterThan,
    LessThanEq,
    GreaterThanEq,
    DoubleEquals,
    NotEquals,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
    Ternary,
    Colon,
    Semicolon,
    Ellipses,
    Assign,
    MultiplyAssign,
    DivideAssign,
    ModulusAssign,
    AddAssign,
    SubtractAssign,
    LeftShiftAssign,
    RightShiftAssign,
    BitAndAssign,
    BitXorAssign,
    BitOrAssign,
    Comma,
    Hash,
    HashConcat,
}

impl Punctuator {
    pub fn text(self) -> &'static str {
        match self {
            Punctuator::OpenBracket => "[",
            Punctuator::CloseBracket => "]",
            Punctuator::OpenParen => "(",
            Punctuator::CloseParen => ")",
            Punctuator::OpenCurly => "{",
            Punctuator::CloseCurly => "}",
            Punctuator::Dot => ".",
            Punctuator::Arrow => "->",
            Punctuator::Increment => "++",
            Punctuator::Decrement => "--",
            Punctuator::Ampersand => "&",
            Punctuator::Multiply => "*",
            Punctuator::Add => "+",
            Punctuator::Subtract => "-",
            Punctuator::BitComplement => "~",
            Punctuator::Not => "!",
            Punctuator::Divide => "/",
            Punctuator::Modulus => "%",
            Punctuator::LeftShift => "<<",
            Punctuator::RightShift => ">>",
            Punctuator::LessThan => "<",
            Punctuator::GreaterThan => ">",
            Punctuator::LessThanEq => "<=",
            Punctuator::GreaterThanEq => ">=",
            Punctuator::DoubleEquals => "==",
            Punctuator::NotEquals => "!=",
            Punctuator::BitXor => "^",
            Punctuator::BitOr => "|",
            Punctuator::LogicalAnd => "&&",
            Punctuator::LogicalOr => "||",
            Punctuator::Ternary => "?",
            Punctuator::Colon => ":",
            Punctuator::Semicolon => ";",
            Punctuator::Ellipses => "...",
            Punctuator::Assign => "=",
            Punctuator::MultiplyAssign => "*=",
            Punctuator::DivideAssign => "/=",
            Punctuator::ModulusAssign => "%=",
            Punctuator::AddAssign => "+=",
            Punctuator::SubtractAssign => "-=",
            Punctuator::LeftShiftAssign => "<<=",
            Punctuator::RightShiftAssign => ">>=",
            Punctuator::BitAndAssign => "&=",
            Punctuator::BitXorAssign => "^=",
            Punctuator::BitOrAssign => "|=",
            Punctuator::Comma => ",",
            Punctuator::Hash => "#",
            Punctuator::HashConcat => "##",
        }
    }

    /// Inverse of `text`, for re-lexing pasted spellings.
    pub fn from_text(text: &str) -> Option<Punctuator> {
        use Punctuator::*;

        Some(match text {
            "[" => OpenBracket,
            "]" => CloseBracket,
            "(" => OpenParen,
            ")" => CloseParen,
            "{" => OpenCurly,
            "}" => CloseCurly,
            "." => Dot,
            "->" => Arrow,
            "++" => Increment,
            "--" => Decrement,
            "&" => Ampersand,
            "*" => Multiply,
            "+" => Add,
            "-" => Subtract,
            "~" => BitComplement,
            "!" => Not,
            "/" => Divide,
            "%" => Modulus,
            "<<" => LeftShift,
            ">>" => RightShift,
            "<" => LessThan,
            ">" => GreaterThan,
            "<=" => LessThanEq,
            ">=" => GreaterThanEq,
            "==" => DoubleEquals,
            "!=" => NotEquals,
            "^" => BitXor,
            "|" => BitOr,
            "&&" => LogicalAnd,
            "||" => LogicalOr,
            "?" => Ternary,
            ":" => Colon,
            ";" => Semicolon,
            "..." => Ellipses,
            "=" => Assign,
            "*=" => MultiplyAssign,
            "/=" => DivideAssign,
            "%=" => ModulusAssign,
            "+=" => AddAssign,
            "-=" => SubtractAssign,
            "<<=" => LeftShiftAssign,
            ">>=" => RightShiftAssign,
            "&=" => BitAndAssign,
            "^=" => BitXorAssign,
            "|=" => BitOrAssign,
            "," => Comma,
            "#" => Hash,
            "##" => HashConcat,
            _ => return None,
        })
    }
}

impl Display for Punctuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}
