use super::expand::expand_list;
use super::macros::MacroTable;
use super::pre_token::{PreToken, PreTokenKind};
use super::punctuator::Punctuator;
use crate::diagnostics::Diagnostics;
use crate::equiv::Attribute;
use crate::link::Unifier;
use crate::look_ahead::LookAhead;
use crate::origin::Tokid;

/*
   Conditional-inclusion expressions.

   The directive line is processed in the standard order: the `defined`
   operator first (it must not see macro replacement), then macro
   expansion, then every surviving identifier becomes 0, and what is left
   must parse as a C constant integer expression. Any error is reported
   and the whole expression counts as false.
*/

pub fn evaluate(
    line: Vec<PreToken>,
    macros: &MacroTable,
    unifier: &dyn Unifier,
    diagnostics: &Diagnostics,
    origin: Tokid,
) -> bool {
    let folded = match fold_defined(line, macros, unifier, diagnostics) {
        Some(folded) => folded,
        None => return false,
    };

    let expanded = expand_list(folded, macros, unifier, diagnostics);

    let meaningful: Vec<PreToken> = expanded
        .into_iter()
        .filter(|token| !token.is_space())
        .map(|token| match &token.kind {
            // Identifiers that survive expansion evaluate to zero
            PreTokenKind::Identifier(_) => PreToken {
                kind: PreTokenKind::Number("0".into()),
                parts: token.parts.clone(),
                hideset: token.hideset.clone(),
            },
            _ => token,
        })
        .collect();

    let parsed = ExprParser::parse(&meaningful);

    match parsed.and_then(|expr| eval(&expr)) {
        Ok(value) => value != 0,
        Err(message) => {
            diagnostics.error(origin, message);
            false
        }
    }
}

/// Replace `defined X` and `defined(X)` with 1 or 0, unifying defined
/// names with their definitions.
fn fold_defined(
    line: Vec<PreToken>,
    macros: &MacroTable,
    unifier: &dyn Unifier,
    diagnostics: &Diagnostics,
) -> Option<Vec<PreToken>> {
    let mut folded = Vec::with_capacity(line.len());
    let mut tokens = LookAhead::new(line.into_iter());

    while let Some(token) = tokens.next() {
        if !token.is_identifier_named("defined") {
            folded.push(token);
            continue;
        }

        while tokens.peek().map_or(false, |t| t.is_space()) {
            tokens.next();
        }

        let parenthesized = tokens
            .next_if(|t| t.is_punctuator(Punctuator::OpenParen))
            .is_some();

        if parenthesized {
            while tokens.peek().map_or(false, |t| t.is_space()) {
                tokens.next();
            }
        }

        let Some(name_token) = tokens.next_if(|t| t.kind.is_identifier()) else {
            diagnostics.error(
                token.origin(),
                "no identifier following the defined operator",
            );
            return None;
        };

        if parenthesized {
            while tokens.peek().map_or(false, |t| t.is_space()) {
                tokens.next();
            }
            if tokens
                .next_if(|t| t.is_punctuator(Punctuator::CloseParen))
                .is_none()
            {
                diagnostics.error(
                    token.origin(),
                    "missing close parenthesis in defined operator",
                );
                return None;
            }
        }

        let name = name_token.identifier_name().expect("checked above");
        let replacement = match macros.find(name) {
            Some(definition) => {
                unifier.unify(&definition.name_token, &name_token);
                "1"
            }
            None => {
                unifier.set_attr(&name_token, Attribute::UndefinedMacro);
                "0"
            }
        };

        folded.push(PreToken {
            kind: PreTokenKind::Number(replacement.into()),
            parts: name_token.parts.clone(),
            hideset: name_token.hideset.clone(),
        });
    }

    Some(folded)
}

#[derive(Debug)]
enum ConstExpr {
    Constant(i64),
    Unary(UnaryOp, Box<ConstExpr>),
    Binary(BinaryOp, Box<ConstExpr>, Box<ConstExpr>),
    Ternary(Box<ConstExpr>, Box<ConstExpr>, Box<ConstExpr>),
}

#[derive(Copy, Clone, Debug)]
enum UnaryOp {
    Plus,
    Negate,
    Not,
    Complement,
}

#[derive(Copy, Clone, Debug)]
enum BinaryOp {
    Multiply,
    Divide,
    Modulus,
    Add,
    Subtract,
    LeftShift,
    RightShift,
    LessThan,
    LessThanEq,
    GreaterThan,
    GreaterThanEq,
    Equals,
    NotEquals,
    BitAnd,
    BitXor,
    BitOr,
    LogicalAnd,
    LogicalOr,
}

struct ExprParser<'t> {
    tokens: &'t [PreToken],
    pos: usize,
}

impl<'t> ExprParser<'t> {
    fn parse(tokens: &'t [PreToken]) -> Result<ConstExpr, String> {
        let mut parser = Self { tokens, pos: 0 };
        let expr = parser.parse_ternary()?;

        if parser.pos != tokens.len() {
            return Err("syntax error in preprocessor expression".into());
        }

        Ok(expr)
    }

    fn peek(&self) -> Option<&PreTokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn eat_punctuator(&mut self, punctuator: Punctuator) -> bool {
        match self.peek() {
            Some(PreTokenKind::Punctuator(p)) if *p == punctuator => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_ternary(&mut self) -> Result<ConstExpr, String> {
        let condition = self.parse_binary(0)?;

        if !self.eat_punctuator(Punctuator::Ternary) {
            return Ok(condition);
        }

        let when_true = self.parse_ternary()?;
        if !self.eat_punctuator(Punctuator::Colon) {
            return Err("expected ':' in conditional expression".into());
        }
        let when_false = self.parse_ternary()?;

        Ok(ConstExpr::Ternary(
            Box::new(condition),
            Box::new(when_true),
            Box::new(when_false),
        ))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<ConstExpr, String> {
        let mut left = self.parse_unary()?;

        while let Some((op, precedence)) = self.peek().and_then(binary_op) {
            if precedence < min_precedence {
                break;
            }

            self.pos += 1;
            let right = self.parse_binary(precedence + 1)?;
            left = ConstExpr::Binary(op, Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ConstExpr, String> {
        let unary = match self.peek() {
            Some(PreTokenKind::Punctuator(Punctuator::Add)) => Some(UnaryOp::Plus),
            Some(PreTokenKind::Punctuator(Punctuator::Subtract)) => Some(UnaryOp::Negate),
            Some(PreTokenKind::Punctuator(Punctuator::Not)) => Some(UnaryOp::Not),
            Some(PreTokenKind::Punctuator(Punctuator::BitComplement)) => {
                Some(UnaryOp::Complement)
            }
            _ => None,
        };

        if let Some(op) = unary {
            self.pos += 1;
            return Ok(ConstExpr::Unary(op, Box::new(self.parse_unary()?)));
        }

        if self.eat_punctuator(Punctuator::OpenParen) {
            let inner = self.parse_ternary()?;
            if !self.eat_punctuator(Punctuator::CloseParen) {
                return Err("missing close parenthesis in preprocessor expression".into());
            }
            return Ok(inner);
        }

        match self.peek() {
            Some(PreTokenKind::Number(text)) => {
                let value = parse_integer(text)?;
                self.pos += 1;
                Ok(ConstExpr::Constant(value))
            }
            Some(PreTokenKind::CharacterConstant(_, content)) => {
                let value = character_constant_value(content)?;
                self.pos += 1;
                Ok(ConstExpr::Constant(value))
            }
            _ => Err("syntax error in preprocessor expression".into()),
        }
    }
}

fn binary_op(kind: &PreTokenKind) -> Option<(BinaryOp, u8)> {
    use Punctuator::*;

    let PreTokenKind::Punctuator(punctuator) = kind else {
        return None;
    };

    Some(match punctuator {
        Multiply => (BinaryOp::Multiply, 10),
        Divide => (BinaryOp::Divide, 10),
        Modulus => (BinaryOp::Modulus, 10),
        Add => (BinaryOp::Add, 9),
        Subtract => (BinaryOp::Subtract, 9),
        LeftShift => (BinaryOp::LeftShift, 8),
        RightShift => (BinaryOp::RightShift, 8),
        LessThan => (BinaryOp::LessThan, 7),
        LessThanEq => (BinaryOp::LessThanEq, 7),
        GreaterThan => (BinaryOp::GreaterThan, 7),
        GreaterThanEq => (BinaryOp::GreaterThanEq, 7),
        DoubleEquals => (BinaryOp::Equals, 6),
        NotEquals => (BinaryOp::NotEquals, 6),
        Ampersand => (BinaryOp::BitAnd, 5),
        BitXor => (BinaryOp::BitXor, 4),
        BitOr => (BinaryOp::BitOr, 3),
        LogicalAnd => (BinaryOp::LogicalAnd, 2),
        LogicalOr => (BinaryOp::LogicalOr, 1),
        _ => return None,
    })
}

/// Character constants keep their source spelling; the numeric value is
/// decoded here, where it is actually needed.
fn character_constant_value(content: &str) -> Result<i64, String> {
    let mut chars = content.chars();
    let Some(first) = chars.next() else {
        return Err("empty character constant".into());
    };

    let (value, rest) = if first == '\\' {
        decode_escape(chars.as_str())?
    } else {
        (first as i64, chars.as_str())
    };

    if !rest.is_empty() {
        return Err("multi-character constant in preprocessor expression".into());
    }

    Ok(value)
}

fn decode_escape(body: &str) -> Result<(i64, &str), String> {
    fn bad() -> String {
        "bad escape sequence in character constant".into()
    }

    let mut chars = body.chars();
    let kind = chars.next().ok_or_else(bad)?;
    let rest = chars.as_str();

    match kind {
        '\'' | '"' | '?' | '\\' => Ok((kind as i64, rest)),
        'a' => Ok((0x07, rest)),
        'b' => Ok((0x08, rest)),
        'f' => Ok((0x0C, rest)),
        'n' => Ok((0x0A, rest)),
        'r' => Ok((0x0D, rest)),
        't' => Ok((0x09, rest)),
        'v' => Ok((0x0B, rest)),
        '0'..='7' => {
            let len = body
                .chars()
                .take(3)
                .take_while(|c| ('0'..='7').contains(c))
                .count();
            let value = i64::from_str_radix(&body[..len], 8).map_err(|_| bad())?;
            Ok((value, &body[len..]))
        }
        'x' => {
            let len = rest.chars().take_while(|c| c.is_ascii_hexdigit()).count();
            if len == 0 {
                return Err(bad());
            }
            let value = i64::from_str_radix(&rest[..len], 16).map_err(|_| bad())?;
            Ok((value, &rest[len..]))
        }
        'u' => decode_codepoint(rest, 4),
        'U' => decode_codepoint(rest, 8),
        _ => Err(bad()),
    }
}

fn decode_codepoint(body: &str, count: usize) -> Result<(i64, &str), String> {
    if body.len() < count || !body[..count].chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("bad escape sequence in character constant".into());
    }

    let value = i64::from_str_radix(&body[..count], 16)
        .map_err(|_| "bad escape sequence in character constant".to_string())?;
    Ok((value, &body[count..]))
}

fn parse_integer(text: &str) -> Result<i64, String> {
    // u/U/l/L suffixes are accepted and ignored
    let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);

    if digits.contains('.')
        || (!digits.starts_with("0x")
            && !digits.starts_with("0X")
            && digits.contains(['e', 'E']))
    {
        return Err("floating constant in preprocessor expression".into());
    }

    let (digits, radix) = if let Some(hex) = digits.strip_prefix("0x").or(digits.strip_prefix("0X"))
    {
        (hex, 16)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (&digits[1..], 8)
    } else {
        (digits, 10)
    };

    match i64::from_str_radix(digits, radix) {
        Ok(value) => Ok(value),
        Err(error) if *error.kind() == std::num::IntErrorKind::PosOverflow => {
            u64::from_str_radix(digits, radix)
                .map(|value| value as i64)
                .map_err(|_| "bad integer in preprocessor expression".to_string())
        }
        Err(_) => Err("bad integer in preprocessor expression".into()),
    }
}

fn eval(expr: &ConstExpr) -> Result<i64, String> {
    Ok(match expr {
        ConstExpr::Constant(value) => *value,
        ConstExpr::Unary(op, inner) => {
            let value = eval(inner)?;
            match op {
                UnaryOp::Plus => value,
                UnaryOp::Negate => value.wrapping_neg(),
                UnaryOp::Not => (value == 0) as i64,
                UnaryOp::Complement => !value,
            }
        }
        ConstExpr::Binary(BinaryOp::LogicalAnd, left, right) => {
            if eval(left)? == 0 {
                0
            } else {
                (eval(right)? != 0) as i64
            }
        }
        ConstExpr::Binary(BinaryOp::LogicalOr, left, right) => {
            if eval(left)? != 0 {
                1
            } else {
                (eval(right)? != 0) as i64
            }
        }
        ConstExpr::Binary(op, left, right) => {
            let left = eval(left)?;
            let right = eval(right)?;

            match op {
                BinaryOp::Multiply => left.wrapping_mul(right),
                BinaryOp::Divide | BinaryOp::Modulus if right == 0 => {
                    return Err("division by zero in preprocessor expression".into())
                }
                BinaryOp::Divide => left.wrapping_div(right),
                BinaryOp::Modulus => left.wrapping_rem(right),
                BinaryOp::Add => left.wrapping_add(right),
                BinaryOp::Subtract => left.wrapping_sub(right),
                BinaryOp::LeftShift => left.wrapping_shl(right as u32),
                BinaryOp::RightShift => left.wrapping_shr(right as u32),
                BinaryOp::LessThan => (left < right) as i64,
                BinaryOp::LessThanEq => (left <= right) as i64,
                BinaryOp::GreaterThan => (left > right) as i64,
                BinaryOp::GreaterThanEq => (left >= right) as i64,
                BinaryOp::Equals => (left == right) as i64,
                BinaryOp::NotEquals => (left != right) as i64,
                BinaryOp::BitAnd => left & right,
                BinaryOp::BitXor => left ^ right,
                BinaryOp::BitOr => left | right,
                BinaryOp::LogicalAnd | BinaryOp::LogicalOr => unreachable!("short-circuited"),
            }
        }
        ConstExpr::Ternary(condition, when_true, when_false) => {
            if eval(condition)? != 0 {
                eval(when_true)?
            } else {
                eval(when_false)?
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::RecordingUnifier;
    use crate::origin::Tokid;
    use crate::preprocessor::encoding::Encoding;
    use crate::preprocessor::macros::Macro;
    use crate::source_files::FileKey;

    fn at(offset: u32) -> Tokid {
        Tokid::new(FileKey::from_index(1), offset)
    }

    fn ident(name: &str, offset: u32) -> PreToken {
        PreTokenKind::Identifier(name.into()).at(at(offset), name.len() as u32)
    }

    fn number(text: &str, offset: u32) -> PreToken {
        PreTokenKind::Number(text.into()).at(at(offset), text.len() as u32)
    }

    fn punct(punctuator: Punctuator, offset: u32) -> PreToken {
        PreTokenKind::Punctuator(punctuator).at(at(offset), 1)
    }

    fn run(line: Vec<PreToken>) -> (bool, usize) {
        let macros = MacroTable::new();
        let unifier = RecordingUnifier::new();
        let diagnostics = Diagnostics::new();
        let value = evaluate(line, &macros, &unifier, &diagnostics, at(0));
        (value, diagnostics.error_count())
    }

    fn value_of(line: Vec<PreToken>) -> bool {
        let (value, errors) = run(line);
        assert_eq!(errors, 0);
        value
    }

    #[test]
    fn arithmetic_and_precedence() {
        // 2 + 3 * 4 == 14
        assert!(value_of(vec![
            number("2", 0),
            punct(Punctuator::Add, 1),
            number("3", 2),
            punct(Punctuator::Multiply, 3),
            number("4", 4),
            punct(Punctuator::DoubleEquals, 5),
            number("14", 6),
        ]));
    }

    #[test]
    fn radix_and_suffixes() {
        // 0x10 == 16 with a suffixed operand
        assert!(value_of(vec![
            number("0x10", 0),
            punct(Punctuator::DoubleEquals, 4),
            number("16UL", 5),
        ]));
        // 010 is octal
        assert!(value_of(vec![
            number("010", 0),
            punct(Punctuator::DoubleEquals, 3),
            number("8", 4),
        ]));
    }

    #[test]
    fn unknown_identifiers_are_zero() {
        let (value, errors) = run(vec![ident("NOT_DEFINED", 0)]);
        assert!(!value);
        assert_eq!(errors, 0);
    }

    #[test]
    fn ternary_and_comparisons() {
        // 1 < 2 ? 5 : 0
        assert!(value_of(vec![
            number("1", 0),
            punct(Punctuator::LessThan, 1),
            number("2", 2),
            punct(Punctuator::Ternary, 3),
            number("5", 4),
            punct(Punctuator::Colon, 5),
            number("0", 6),
        ]));
    }

    #[test]
    fn shifts_and_bitwise() {
        // (1 << 4) | 1 == 17
        assert!(value_of(vec![
            punct(Punctuator::OpenParen, 0),
            number("1", 1),
            punct(Punctuator::LeftShift, 2),
            number("4", 3),
            punct(Punctuator::CloseParen, 4),
            punct(Punctuator::BitOr, 5),
            number("1", 6),
            punct(Punctuator::DoubleEquals, 7),
            number("17", 8),
        ]));
    }

    #[test]
    fn division_by_zero_reports_and_is_false() {
        let (value, errors) = run(vec![
            number("1", 0),
            punct(Punctuator::Divide, 1),
            number("0", 2),
        ]);
        assert!(!value);
        assert_eq!(errors, 1);
    }

    #[test]
    fn short_circuit_guards_division() {
        // 0 && 1/0 is false without a division error
        assert!(!value_of(vec![
            number("0", 0),
            punct(Punctuator::LogicalAnd, 1),
            number("1", 2),
            punct(Punctuator::Divide, 3),
            number("0", 4),
        ]));
    }

    #[test]
    fn floating_constant_is_an_error() {
        let (value, errors) = run(vec![number("1.5", 0)]);
        assert!(!value);
        assert_eq!(errors, 1);
    }

    #[test]
    fn character_constant_value() {
        // 'A' == 65
        assert!(value_of(vec![
            PreTokenKind::CharacterConstant(Encoding::Default, "A".into()).at(at(0), 3),
            punct(Punctuator::DoubleEquals, 3),
            number("65", 4),
        ]));
    }

    #[test]
    fn escaped_character_constants_decode() {
        // '\x41' == 65, spelling kept in the token
        assert!(value_of(vec![
            PreTokenKind::CharacterConstant(Encoding::Default, r"\x41".into()).at(at(0), 6),
            punct(Punctuator::DoubleEquals, 6),
            number("65", 7),
        ]));
        // '\n' == 10
        assert!(value_of(vec![
            PreTokenKind::CharacterConstant(Encoding::Default, r"\n".into()).at(at(0), 4),
            punct(Punctuator::DoubleEquals, 4),
            number("10", 5),
        ]));
        // '\101' == 65 (octal)
        assert!(value_of(vec![
            PreTokenKind::CharacterConstant(Encoding::Default, r"\101".into()).at(at(0), 6),
            punct(Punctuator::DoubleEquals, 6),
            number("65", 7),
        ]));
    }

    #[test]
    fn bad_character_escape_is_an_error() {
        let (value, errors) = run(vec![
            PreTokenKind::CharacterConstant(Encoding::Default, r"\q".into()).at(at(0), 4),
        ]);
        assert!(!value);
        assert_eq!(errors, 1);
    }

    #[test]
    fn defined_folds_and_unifies() {
        let mut macros = MacroTable::new();
        macros.define(Macro {
            name_token: ident("X", 100),
            is_function: false,
            formals: Vec::new(),
            body: Vec::new(),
        });

        let unifier = RecordingUnifier::new();
        let diagnostics = Diagnostics::new();

        // defined(X) && !defined(Y)
        let line = vec![
            ident("defined", 0),
            punct(Punctuator::OpenParen, 7),
            ident("X", 8),
            punct(Punctuator::CloseParen, 9),
            PreTokenKind::Whitespace.at(at(10), 1),
            punct(Punctuator::LogicalAnd, 11),
            PreTokenKind::Whitespace.at(at(13), 1),
            punct(Punctuator::Not, 14),
            ident("defined", 15),
            punct(Punctuator::OpenParen, 22),
            ident("Y", 23),
            punct(Punctuator::CloseParen, 24),
        ];

        assert!(evaluate(line, &macros, &unifier, &diagnostics, at(0)));
        assert_eq!(
            unifier.unified.borrow().as_slice(),
            &[("X".to_string(), "X".to_string())]
        );
        assert_eq!(
            unifier.attributes.borrow().as_slice(),
            &[("Y".to_string(), Attribute::UndefinedMacro)]
        );
    }

    #[test]
    fn defined_without_identifier_is_an_error() {
        let (value, errors) = run(vec![ident("defined", 0), number("1", 8)]);
        assert!(!value);
        assert_eq!(errors, 1);
    }
}
