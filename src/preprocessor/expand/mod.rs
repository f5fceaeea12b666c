#[cfg(test)]
mod unit_tests;

use super::lexer::{is_identifier_continue, is_identifier_start};
use super::macros::{Macro, MacroTable};
use super::pre_token::{Parts, PreToken, PreTokenKind};
use super::punctuator::Punctuator;
use crate::diagnostics::Diagnostics;
use crate::link::Unifier;
use crate::look_ahead::LookAhead;
use itertools::Itertools;
use std::collections::VecDeque;

/*
   Macro replacement.

   The scan works on a deque seeded with the tokens to expand; every
   replacement is pushed back onto the front and rescanned, so nested and
   chained expansions need no recursion through the scanner itself.
   Hide-sets carried by the tokens terminate self-reference.

   A function-like invocation may extend past the seed (the macro name is
   the last token of a line, the arguments follow), so argument gathering
   can pull further tokens from a live source.
*/

pub trait TokenSource {
    fn next_token(&mut self) -> Option<PreToken>;
    fn peek_token(&mut self, index: usize) -> Option<&PreToken>;
}

/// Source for self-contained regions (`#if` lines, include lines,
/// isolated argument expansion).
pub struct NoMoreTokens;

impl TokenSource for NoMoreTokens {
    fn next_token(&mut self) -> Option<PreToken> {
        None
    }

    fn peek_token(&mut self, _index: usize) -> Option<&PreToken> {
        None
    }
}

pub struct Expander<'e> {
    macros: &'e MacroTable,
    unifier: &'e dyn Unifier,
    diagnostics: &'e Diagnostics,
}

impl<'e> Expander<'e> {
    pub fn new(
        macros: &'e MacroTable,
        unifier: &'e dyn Unifier,
        diagnostics: &'e Diagnostics,
    ) -> Self {
        Self {
            macros,
            unifier,
            diagnostics,
        }
    }

    pub fn expand(&self, seed: Vec<PreToken>, more: &mut dyn TokenSource) -> Vec<PreToken> {
        let mut input: VecDeque<PreToken> = seed.into();
        let mut output = Vec::with_capacity(input.len() + 16);

        while let Some(token) = input.pop_front() {
            let Some(name) = token.identifier_name() else {
                output.push(token);
                continue;
            };

            if token.hideset.contains(name) {
                output.push(token);
                continue;
            }

            let Some(definition) = self.macros.find(name) else {
                output.push(token);
                continue;
            };

            let replacement = if definition.is_function {
                if !consume_through_open_paren(&mut input, more) {
                    // Name without an invocation stays as it is
                    output.push(token);
                    continue;
                }

                let Some(args) = self.gather_arguments(&mut input, more, &token) else {
                    output.push(token);
                    continue;
                };

                let Some(args) = self.check_arity(args, definition, &token) else {
                    output.push(token);
                    continue;
                };

                self.unifier.unify(&definition.name_token, &token);
                self.substitute(definition, &args, &token)
            } else {
                self.unifier.unify(&definition.name_token, &token);
                self.substitute(definition, &[], &token)
            };

            for replaced in replacement.into_iter().rev() {
                input.push_front(replaced);
            }
        }

        output
    }

    fn gather_arguments(
        &self,
        input: &mut VecDeque<PreToken>,
        more: &mut dyn TokenSource,
        use_token: &PreToken,
    ) -> Option<Vec<Vec<PreToken>>> {
        let mut args = vec![Vec::new()];
        let mut depth = 0usize;

        loop {
            let Some(token) = input.pop_front().or_else(|| more.next_token()) else {
                self.diagnostics.error(
                    use_token.origin(),
                    format!("unterminated invocation of macro {}", use_token),
                );
                return None;
            };

            match &token.kind {
                PreTokenKind::Punctuator(Punctuator::OpenParen) => {
                    depth += 1;
                    args.last_mut().unwrap().push(token);
                }
                PreTokenKind::Punctuator(Punctuator::CloseParen) => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    args.last_mut().unwrap().push(token);
                }
                PreTokenKind::Punctuator(Punctuator::Comma) if depth == 0 => {
                    args.push(Vec::new());
                }
                PreTokenKind::Whitespace | PreTokenKind::Newline => (),
                PreTokenKind::EndOfInput => {
                    self.diagnostics.error(
                        use_token.origin(),
                        format!("unterminated invocation of macro {}", use_token),
                    );
                    return None;
                }
                _ => args.last_mut().unwrap().push(token),
            }
        }

        Some(args)
    }

    fn check_arity(
        &self,
        mut args: Vec<Vec<PreToken>>,
        definition: &Macro,
        use_token: &PreToken,
    ) -> Option<Vec<Vec<PreToken>>> {
        // `F()` supplies zero arguments to a parameterless macro
        if definition.formals.is_empty() && args.len() == 1 && args[0].is_empty() {
            args.clear();
        }

        if args.len() == definition.formals.len() {
            Some(args)
        } else {
            self.diagnostics.error(
                use_token.origin(),
                format!(
                    "macro {} requires {} arguments, given {}",
                    use_token,
                    definition.formals.len(),
                    args.len()
                ),
            );
            None
        }
    }

    /// Build the replacement sequence for one invocation: parameter and
    /// `#` substitution, then `##` resolution, then hide-set stamping.
    fn substitute(
        &self,
        definition: &Macro,
        args: &[Vec<PreToken>],
        use_token: &PreToken,
    ) -> Vec<PreToken> {
        let body = &definition.body;
        let mut substituted = Vec::with_capacity(body.len() + 8);
        let mut index = 0;

        while index < body.len() {
            let token = &body[index];

            if definition.is_function {
                if token.is_punctuator(Punctuator::Hash) {
                    if let Some((param_at, formal)) = param_after(body, index + 1, definition) {
                        substituted.push(stringize(&args[formal], token));
                        index = param_at + 1;
                        continue;
                    }
                }

                if let Some(formal) = token
                    .identifier_name()
                    .and_then(|name| definition.formal_index(name))
                {
                    let pasted = nonspace_before_is_concat(body, index)
                        || nonspace_after_is_concat(body, index);

                    if pasted {
                        // Operand of '##': the argument goes in unexpanded
                        if args[formal].is_empty() {
                            substituted
                                .push(PreTokenKind::Placeholder.with_parts(token.parts.clone()));
                        } else {
                            substituted.extend(args[formal].iter().cloned());
                        }
                    } else {
                        let expanded =
                            self.expand(args[formal].clone(), &mut NoMoreTokens);
                        substituted.extend(expanded);
                    }

                    index += 1;
                    continue;
                }
            }

            substituted.push(token.clone());
            index += 1;
        }

        let pasted = self.resolve_concats(substituted, use_token);

        let expansion_hideset = use_token.hideset.with(definition.name());
        pasted
            .into_iter()
            .filter(|token| !token.kind.is_placeholder())
            .map(|mut token| {
                token.hideset = token.hideset.union(&expansion_hideset);
                token
            })
            .collect()
    }

    fn resolve_concats(&self, tokens: Vec<PreToken>, use_token: &PreToken) -> Vec<PreToken> {
        let mut result = Vec::with_capacity(tokens.len());
        let mut iter = LookAhead::new(tokens.into_iter());

        while let Some(first) = iter.next() {
            let mut current = first;

            loop {
                let mut at = 0;
                while iter.peek_nth(at).map_or(false, |t| t.is_space()) {
                    at += 1;
                }

                if !iter
                    .peek_nth(at)
                    .map_or(false, |t| t.is_punctuator(Punctuator::HashConcat))
                {
                    break;
                }

                let mut operand_at = at + 1;
                while iter.peek_nth(operand_at).map_or(false, |t| t.is_space()) {
                    operand_at += 1;
                }

                if iter.peek_nth(operand_at).is_none() {
                    self.diagnostics.error(
                        use_token.origin(),
                        "'##' at the end of a macro replacement list",
                    );
                    for _ in 0..=at {
                        iter.next();
                    }
                    break;
                }

                let mut second = None;
                for _ in 0..=operand_at {
                    second = iter.next();
                }
                let second = second.expect("'##' operand was peeked");

                current = self.paste(current, second, use_token);
            }

            result.push(current);
        }

        result
    }

    fn paste(&self, a: PreToken, b: PreToken, use_token: &PreToken) -> PreToken {
        if a.kind.is_placeholder() {
            return b;
        }
        if b.kind.is_placeholder() {
            return a;
        }

        let joined = format!("{}{}", a, b);

        let kind = match relex_single(&joined) {
            Some(kind) => kind,
            None => {
                self.diagnostics.error(
                    use_token.origin(),
                    format!(
                        "pasting {} and {} does not give a valid preprocessing token",
                        a, b
                    ),
                );
                PreTokenKind::Identifier(joined)
            }
        };

        let mut parts = a.parts.clone();
        parts.extend(b.parts.iter().copied());

        PreToken {
            kind,
            parts,
            hideset: a.hideset.union(&b.hideset),
        }
    }
}

/// Convenience for self-contained token lists.
pub fn expand_list(
    tokens: Vec<PreToken>,
    macros: &MacroTable,
    unifier: &dyn Unifier,
    diagnostics: &Diagnostics,
) -> Vec<PreToken> {
    Expander::new(macros, unifier, diagnostics).expand(tokens, &mut NoMoreTokens)
}

fn consume_through_open_paren(
    input: &mut VecDeque<PreToken>,
    more: &mut dyn TokenSource,
) -> bool {
    let mut offset = 0;

    loop {
        let token = if offset < input.len() {
            Some(&input[offset])
        } else {
            more.peek_token(offset - input.len())
        };

        match token {
            Some(t) if t.is_space() => offset += 1,
            Some(t) if t.is_punctuator(Punctuator::OpenParen) => {
                for _ in 0..=offset {
                    if input.pop_front().is_none() {
                        more.next_token();
                    }
                }
                return true;
            }
            _ => return false,
        }
    }
}

fn param_after(body: &[PreToken], from: usize, definition: &Macro) -> Option<(usize, usize)> {
    let mut at = from;
    while body.get(at).map_or(false, |t| t.is_space()) {
        at += 1;
    }

    let formal = body
        .get(at)?
        .identifier_name()
        .and_then(|name| definition.formal_index(name))?;

    Some((at, formal))
}

fn nonspace_before_is_concat(body: &[PreToken], index: usize) -> bool {
    body[..index]
        .iter()
        .rev()
        .find(|t| !t.is_space())
        .map_or(false, |t| t.is_punctuator(Punctuator::HashConcat))
}

fn nonspace_after_is_concat(body: &[PreToken], index: usize) -> bool {
    body[index + 1..]
        .iter()
        .find(|t| !t.is_space())
        .map_or(false, |t| t.is_punctuator(Punctuator::HashConcat))
}

/// One string literal from the argument's spellings, single-spaced;
/// quotes and backslashes are escaped so the result reads back as the
/// argument's text. Its origin ranges are the concatenation of the
/// argument tokens' ranges.
fn stringize(arg: &[PreToken], hash_token: &PreToken) -> PreToken {
    let spelled = arg.iter().map(|t| t.to_string()).join(" ");

    let mut content = String::with_capacity(spelled.len() + 8);
    for c in spelled.chars() {
        match c {
            '"' => content.push_str("\\\""),
            '\\' => content.push_str("\\\\"),
            c => content.push(c),
        }
    }

    let parts: Parts = if arg.is_empty() {
        hash_token.parts.clone()
    } else {
        arg.iter().flat_map(|t| t.parts.iter().copied()).collect()
    };

    PreTokenKind::StringLiteral(super::encoding::Encoding::Default, content).with_parts(parts)
}

/// Re-lex a pasted spelling; it must form exactly one token.
fn relex_single(text: &str) -> Option<PreTokenKind> {
    let mut chars = text.chars();
    let first = chars.next()?;

    if is_identifier_start(first) && chars.clone().all(is_identifier_continue) {
        return Some(PreTokenKind::Identifier(text.to_string()));
    }

    if first.is_ascii_digit() || (first == '.' && text[1..].starts_with(|c: char| c.is_ascii_digit()))
    {
        if is_pp_number(text) {
            return Some(PreTokenKind::Number(text.to_string()));
        }
        return None;
    }

    Punctuator::from_text(text).map(PreTokenKind::Punctuator)
}

fn is_pp_number(text: &str) -> bool {
    let mut previous = '\0';
    for c in text.chars() {
        let valid = c.is_ascii_alphanumeric()
            || c == '_'
            || c == '$'
            || c == '.'
            || ((c == '+' || c == '-') && matches!(previous, 'e' | 'E' | 'p' | 'P'));
        if !valid {
            return false;
        }
        previous = c;
    }
    true
}
