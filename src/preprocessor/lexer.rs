use super::encoding::Encoding;
use super::pre_token::{PartsBuilder, PreToken, PreTokenKind};
use super::punctuator::Punctuator;
use super::reader::{CharReader, Character};
use crate::diagnostics::Diagnostics;
use crate::origin::Tokid;

/*
   Preprocessor tokenization.

   Whitespace and newlines are real tokens here; the directive processor
   needs both (a `#` is a directive only at the start of a line, and
   `#define A(x)` versus `#define A (x)` hangs on the whitespace before
   the parenthesis). A run of blanks and comments collapses into one
   whitespace token.

   Inside an `#include` line the lexer is switched into header-name
   context so that `<stdio.h>` comes out as a single token.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LexContext {
    Normal,
    HeaderName,
}

pub struct Lexer<'a> {
    reader: CharReader<'a>,
    context: LexContext,
    diagnostics: &'a Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(reader: CharReader<'a>, diagnostics: &'a Diagnostics) -> Self {
        Self {
            reader,
            context: LexContext::Normal,
            diagnostics,
        }
    }

    pub fn set_context(&mut self, context: LexContext) {
        self.context = context;
    }

    pub fn reader(&self) -> &CharReader<'a> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut CharReader<'a> {
        &mut self.reader
    }

    pub fn next_token(&mut self) -> PreToken {
        use Punctuator::*;

        let (c, start) = match self.reader.next() {
            Character::At(c, tokid) => (c, tokid),
            Character::End(tokid) => return PreTokenKind::EndOfInput.at(tokid, 0),
        };

        let mut parts = PartsBuilder::new();
        parts.push(start);

        match c {
            '\n' => PreTokenKind::Newline.with_parts(parts.finish()),
            ' ' | '\t' | '\r' | '\u{0B}' | '\u{0C}' => self.lex_whitespace(parts),
            '/' if self.reader.peek().is('/') || self.reader.peek().is('*') => {
                self.lex_comment_then_whitespace(parts, start)
            }
            '0'..='9' => self.lex_number(c, parts),
            '.' if self.reader.peek().is_digit() => self.lex_number(c, parts),
            '\'' => self.lex_character(Encoding::Default, parts, start),
            'u' if self.eat("8'", &mut parts) => self.lex_character(Encoding::Utf8, parts, start),
            'u' if self.eat("'", &mut parts) => self.lex_character(Encoding::Utf16, parts, start),
            'U' if self.eat("'", &mut parts) => self.lex_character(Encoding::Utf32, parts, start),
            'L' if self.eat("'", &mut parts) => self.lex_character(Encoding::Wide, parts, start),
            '"' => self.lex_string(Encoding::Default, parts, start),
            'u' if self.eat("8\"", &mut parts) => self.lex_string(Encoding::Utf8, parts, start),
            'u' if self.eat("\"", &mut parts) => self.lex_string(Encoding::Utf16, parts, start),
            'U' if self.eat("\"", &mut parts) => self.lex_string(Encoding::Utf32, parts, start),
            'L' if self.eat("\"", &mut parts) => self.lex_string(Encoding::Wide, parts, start),
            '<' if self.context == LexContext::HeaderName => self.lex_header_name(parts, start),
            '.' if self.eat("..", &mut parts) => self.punctuator(Ellipses, parts),
            '-' if self.eat(">", &mut parts) => self.punctuator(Arrow, parts),
            '+' if self.eat("+", &mut parts) => self.punctuator(Increment, parts),
            '-' if self.eat("-", &mut parts) => self.punctuator(Decrement, parts),
            '#' if self.eat("#", &mut parts) => self.punctuator(HashConcat, parts),
            '<' if self.eat("<=", &mut parts) => self.punctuator(LeftShiftAssign, parts),
            '>' if self.eat(">=", &mut parts) => self.punctuator(RightShiftAssign, parts),
            '<' if self.eat("<", &mut parts) => self.punctuator(LeftShift, parts),
            '>' if self.eat(">", &mut parts) => self.punctuator(RightShift, parts),
            '!' if self.eat("=", &mut parts) => self.punctuator(NotEquals, parts),
            '<' if self.eat("=", &mut parts) => self.punctuator(LessThanEq, parts),
            '>' if self.eat("=", &mut parts) => self.punctuator(GreaterThanEq, parts),
            '=' if self.eat("=", &mut parts) => self.punctuator(DoubleEquals, parts),
            '&' if self.eat("&", &mut parts) => self.punctuator(LogicalAnd, parts),
            '|' if self.eat("|", &mut parts) => self.punctuator(LogicalOr, parts),
            '*' if self.eat("=", &mut parts) => self.punctuator(MultiplyAssign, parts),
            '/' if self.eat("=", &mut parts) => self.punctuator(DivideAssign, parts),
            '%' if self.eat("=", &mut parts) => self.punctuator(ModulusAssign, parts),
            '+' if self.eat("=", &mut parts) => self.punctuator(AddAssign, parts),
            '-' if self.eat("=", &mut parts) => self.punctuator(SubtractAssign, parts),
            '&' if self.eat("=", &mut parts) => self.punctuator(BitAndAssign, parts),
            '|' if self.eat("=", &mut parts) => self.punctuator(BitOrAssign, parts),
            '^' if self.eat("=", &mut parts) => self.punctuator(BitXorAssign, parts),
            '[' => self.punctuator(OpenBracket, parts),
            ']' => self.punctuator(CloseBracket, parts),
            '(' => self.punctuator(OpenParen, parts),
            ')' => self.punctuator(CloseParen, parts),
            '{' => self.punctuator(OpenCurly, parts),
            '}' => self.punctuator(CloseCurly, parts),
            ',' => self.punctuator(Comma, parts),
            ':' => self.punctuator(Colon, parts),
            ';' => self.punctuator(Semicolon, parts),
            '*' => self.punctuator(Multiply, parts),
            '=' => self.punctuator(Assign, parts),
            '#' => self.punctuator(Hash, parts),
            '.' => self.punctuator(Dot, parts),
            '&' => self.punctuator(Ampersand, parts),
            '+' => self.punctuator(Add, parts),
            '-' => self.punctuator(Subtract, parts),
            '~' => self.punctuator(BitComplement, parts),
            '!' => self.punctuator(Not, parts),
            '/' => self.punctuator(Divide, parts),
            '%' => self.punctuator(Modulus, parts),
            '<' => self.punctuator(LessThan, parts),
            '>' => self.punctuator(GreaterThan, parts),
            '^' => self.punctuator(BitXor, parts),
            '|' => self.punctuator(BitOr, parts),
            '?' => self.punctuator(Ternary, parts),
            'a'..='z' | 'A'..='Z' | '_' | '$' => self.lex_identifier(c, parts),
            other => PreTokenKind::Other(other).with_parts(parts.finish()),
        }
    }

    fn punctuator(&self, punctuator: Punctuator, parts: PartsBuilder) -> PreToken {
        PreTokenKind::Punctuator(punctuator).with_parts(parts.finish())
    }

    /// Consume `pattern` if it is next, recording consumed origins.
    fn eat(&mut self, pattern: &str, parts: &mut PartsBuilder) -> bool {
        for (index, expected) in pattern.chars().enumerate() {
            if !self.reader.peek_nth(index).is(expected) {
                return false;
            }
        }

        for _ in pattern.chars() {
            if let Character::At(_, tokid) = self.reader.next() {
                parts.push(tokid);
            }
        }

        true
    }

    fn lex_whitespace(&mut self, mut parts: PartsBuilder) -> PreToken {
        loop {
            match self.reader.peek() {
                Character::At(' ' | '\t' | '\r' | '\u{0B}' | '\u{0C}', tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                }
                Character::At('/', _) if self.reader.peek_nth(1).is('/') => {
                    self.consume_two(&mut parts);
                    self.skip_line_comment(&mut parts);
                }
                Character::At('/', comment_start) if self.reader.peek_nth(1).is('*') => {
                    self.consume_two(&mut parts);
                    self.scan_to_comment_end(&mut parts, comment_start);
                }
                _ => break,
            }
        }

        PreTokenKind::Whitespace.with_parts(parts.finish())
    }

    // A comment starts the whitespace run it collapses into; the leading
    // '/' is already consumed here
    fn lex_comment_then_whitespace(&mut self, mut parts: PartsBuilder, start: Tokid) -> PreToken {
        if self.reader.peek().is('/') {
            if let Character::At(_, tokid) = self.reader.next() {
                parts.push(tokid);
            }
            self.skip_line_comment(&mut parts);
        } else {
            if let Character::At(_, tokid) = self.reader.next() {
                parts.push(tokid);
            }
            self.scan_to_comment_end(&mut parts, start);
        }

        self.lex_whitespace(parts)
    }

    fn skip_line_comment(&mut self, parts: &mut PartsBuilder) {
        // Leaves the terminating newline for the caller
        loop {
            match self.reader.peek() {
                Character::At('\n', _) | Character::End(_) => break,
                Character::At(_, tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                }
            }
        }
    }

    fn consume_two(&mut self, parts: &mut PartsBuilder) {
        for _ in 0..2 {
            if let Character::At(_, tokid) = self.reader.next() {
                parts.push(tokid);
            }
        }
    }

    // Scans past the closing "*/"; "/*" is already consumed
    fn scan_to_comment_end(&mut self, parts: &mut PartsBuilder, start: Tokid) {
        loop {
            match self.reader.next() {
                Character::At('*', tokid) if self.reader.peek().is('/') => {
                    parts.push(tokid);
                    if let Character::At(_, slash) = self.reader.next() {
                        parts.push(slash);
                    }
                    return;
                }
                Character::At(_, tokid) => parts.push(tokid),
                Character::End(_) => {
                    self.diagnostics.error(start, "unterminated comment");
                    return;
                }
            }
        }
    }

    fn lex_identifier(&mut self, first: char, mut parts: PartsBuilder) -> PreToken {
        let mut name = String::from(first);

        while let Character::At(c, tokid) = self.reader.peek() {
            if !is_identifier_continue(c) {
                break;
            }
            self.reader.next();
            parts.push(tokid);
            name.push(c);
        }

        PreTokenKind::Identifier(name).with_parts(parts.finish())
    }

    fn lex_number(&mut self, first: char, mut parts: PartsBuilder) -> PreToken {
        // A pp-number is broader than a numeric constant; the shape is
        // settled by the C standard, oddities included.
        let mut value = String::from(first);

        loop {
            match self.reader.peek() {
                Character::At(c @ ('e' | 'E' | 'p' | 'P'), tokid)
                    if self.reader.peek_nth(1).is_sign() =>
                {
                    self.reader.next();
                    parts.push(tokid);
                    value.push(c);
                    if let Character::At(sign, sign_tokid) = self.reader.next() {
                        parts.push(sign_tokid);
                        value.push(sign);
                    }
                }
                Character::At(c, tokid) if is_number_continue(c) => {
                    self.reader.next();
                    parts.push(tokid);
                    value.push(c);
                }
                _ => break,
            }
        }

        PreTokenKind::Number(value).with_parts(parts.finish())
    }

    fn lex_string(&mut self, encoding: Encoding, mut parts: PartsBuilder, start: Tokid) -> PreToken {
        let mut value = String::new();

        loop {
            match self.reader.peek() {
                Character::At('"', tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    break;
                }
                Character::At('\\', tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    value.push('\\');
                    self.lex_escape(&mut parts, &mut value, tokid);
                }
                Character::At('\n', _) | Character::End(_) => {
                    self.diagnostics.error(start, "unterminated string literal");
                    break;
                }
                Character::At(c, tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    value.push(c);
                }
            }
        }

        PreTokenKind::StringLiteral(encoding, value).with_parts(parts.finish())
    }

    fn lex_character(
        &mut self,
        encoding: Encoding,
        mut parts: PartsBuilder,
        start: Tokid,
    ) -> PreToken {
        let mut value = String::new();

        loop {
            match self.reader.peek() {
                Character::At('\'', tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    break;
                }
                Character::At('\\', tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    value.push('\\');
                    self.lex_escape(&mut parts, &mut value, tokid);
                }
                Character::At('\n', _) | Character::End(_) => {
                    self.diagnostics
                        .error(start, "unterminated character constant");
                    break;
                }
                Character::At(c, tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    value.push(c);
                }
            }
        }

        PreTokenKind::CharacterConstant(encoding, value).with_parts(parts.finish())
    }

    fn lex_header_name(&mut self, mut parts: PartsBuilder, start: Tokid) -> PreToken {
        let mut name = String::new();

        loop {
            match self.reader.peek() {
                Character::At('>', tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    break;
                }
                Character::At('\n', _) | Character::End(_) => {
                    self.diagnostics.error(start, "unterminated header name");
                    break;
                }
                Character::At(c, tokid) => {
                    self.reader.next();
                    parts.push(tokid);
                    name.push(c);
                }
            }
        }

        PreTokenKind::HeaderName(name).with_parts(parts.finish())
    }

    // Escapes stay exactly as written; only the introducer is checked.
    // Whoever needs the numeric value decodes the spelling later.
    fn lex_escape(&mut self, parts: &mut PartsBuilder, value: &mut String, escape_start: Tokid) {
        match self.reader.peek() {
            Character::At('\n', _) | Character::End(_) => (),
            Character::At(c, tokid) => {
                self.reader.next();
                parts.push(tokid);
                value.push(c);

                if !matches!(
                    c,
                    '\'' | '"'
                        | '?'
                        | '\\'
                        | 'a'
                        | 'b'
                        | 'f'
                        | 'n'
                        | 'r'
                        | 't'
                        | 'v'
                        | 'x'
                        | 'u'
                        | 'U'
                        | '0'..='7'
                ) {
                    self.diagnostics.error(escape_start, "bad escape sequence");
                }
            }
        }
    }
}

pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_digit() || is_identifier_start(c)
}

fn is_number_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.'
}
