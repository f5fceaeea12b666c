use super::*;
use crate::diagnostics::Diagnostics;
use crate::link::RecordingUnifier;
use crate::origin::Tokid;
use crate::preprocessor::encoding::Encoding;
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
    PreTokenKind::Punctuator(punctuator).at(at(offset), punctuator.text().len() as u32)
}

fn space(offset: u32) -> PreToken {
    PreTokenKind::Whitespace.at(at(offset), 1)
}

fn spell(tokens: &[PreToken]) -> String {
    tokens.iter().map(|t| t.to_string()).collect()
}

fn object_macro(name: &str, body: Vec<PreToken>) -> Macro {
    Macro {
        name_token: ident(name, 1000),
        is_function: false,
        formals: Vec::new(),
        body,
    }
}

fn function_macro(name: &str, formals: &[&str], body: Vec<PreToken>) -> Macro {
    Macro {
        name_token: ident(name, 1000),
        is_function: true,
        formals: formals
            .iter()
            .enumerate()
            .map(|(i, f)| ident(f, 1100 + i as u32 * 10))
            .collect(),
        body,
    }
}

struct VecSource {
    tokens: std::collections::VecDeque<PreToken>,
}

impl VecSource {
    fn new(tokens: Vec<PreToken>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }
}

impl TokenSource for VecSource {
    fn next_token(&mut self) -> Option<PreToken> {
        self.tokens.pop_front()
    }

    fn peek_token(&mut self, index: usize) -> Option<&PreToken> {
        self.tokens.get(index)
    }
}

#[test]
fn non_macro_identifier_is_identity() {
    let macros = MacroTable::new();
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(vec![ident("x", 0)], &macros, &unifier, &diagnostics);
    assert_eq!(spell(&out), "x");
    assert!(unifier.unified.borrow().is_empty());
}

#[test]
fn object_macro_replaces_and_unifies() {
    let mut macros = MacroTable::new();
    macros.define(object_macro("MAX", vec![number("100", 20)]));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(vec![ident("MAX", 0)], &macros, &unifier, &diagnostics);
    assert_eq!(spell(&out), "100");
    assert_eq!(
        unifier.unified.borrow().as_slice(),
        &[("MAX".to_string(), "MAX".to_string())]
    );
}

#[test]
fn recursive_object_macro_stops_via_hideset() {
    let mut macros = MacroTable::new();
    macros.define(object_macro(
        "y",
        vec![ident("y", 20), punct(Punctuator::Add, 21), number("1", 22)],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(vec![ident("y", 0)], &macros, &unifier, &diagnostics);
    assert_eq!(spell(&out), "y+1");
    assert!(out[0].hideset.contains("y"));
}

#[test]
fn mutually_recursive_macros_terminate() {
    let mut macros = MacroTable::new();
    macros.define(object_macro("A", vec![ident("B", 20)]));
    macros.define(object_macro("B", vec![ident("A", 30)]));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(vec![ident("A", 0)], &macros, &unifier, &diagnostics);
    assert_eq!(spell(&out), "A");
}

#[test]
fn function_macro_hygiene() {
    // f(1) with f(x) = x + f leaves the inner f alone
    let mut macros = MacroTable::new();
    macros.define(function_macro(
        "f",
        &["x"],
        vec![
            ident("x", 20),
            space(21),
            punct(Punctuator::Add, 22),
            space(23),
            ident("f", 24),
        ],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("f", 0),
            punct(Punctuator::OpenParen, 1),
            number("1", 2),
            punct(Punctuator::CloseParen, 3),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(spell(&out), "1 + f");
    assert!(out.last().unwrap().hideset.contains("f"));
    assert!(diagnostics.is_empty());
}

#[test]
fn function_macro_without_parentheses_stays() {
    let mut macros = MacroTable::new();
    macros.define(function_macro("F", &["x"], vec![ident("x", 20)]));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![ident("F", 0), space(1), ident("y", 2)],
        &macros,
        &unifier,
        &diagnostics,
    );
    assert_eq!(spell(&out), "F y");
    assert!(unifier.unified.borrow().is_empty());
}

#[test]
fn invocation_spans_into_the_live_source() {
    let mut macros = MacroTable::new();
    macros.define(function_macro("F", &["x"], vec![ident("x", 20)]));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let mut more = VecSource::new(vec![
        punct(Punctuator::OpenParen, 10),
        number("7", 11),
        punct(Punctuator::CloseParen, 12),
    ]);

    let expander = Expander::new(&macros, &unifier, &diagnostics);
    let out = expander.expand(vec![ident("F", 0)], &mut more);
    assert_eq!(spell(&out), "7");
}

#[test]
fn arguments_are_expanded_before_substitution() {
    let mut macros = MacroTable::new();
    macros.define(function_macro("ID", &["x"], vec![ident("x", 20)]));
    macros.define(object_macro("ONE", vec![number("1", 30)]));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("ID", 0),
            punct(Punctuator::OpenParen, 2),
            ident("ONE", 3),
            punct(Punctuator::CloseParen, 6),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );
    assert_eq!(spell(&out), "1");
}

#[test]
fn pasting_builds_one_identifier_with_both_origins() {
    // GLUE(foo, bar) -> foobar carrying the origin ranges of both halves
    let mut macros = MacroTable::new();
    macros.define(function_macro(
        "GLUE",
        &["a", "b"],
        vec![
            ident("a", 20),
            punct(Punctuator::HashConcat, 21),
            ident("b", 23),
        ],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("GLUE", 0),
            punct(Punctuator::OpenParen, 4),
            ident("foo", 5),
            punct(Punctuator::Comma, 8),
            space(9),
            ident("bar", 10),
            punct(Punctuator::CloseParen, 13),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, PreTokenKind::Identifier("foobar".into()));
    assert_eq!(out[0].parts.len(), 2);
    assert_eq!(out[0].parts[0].start.offset, 5);
    assert_eq!(out[0].parts[0].len, 3);
    assert_eq!(out[0].parts[1].start.offset, 10);
    assert_eq!(out[0].parts[1].len, 3);
    assert!(diagnostics.is_empty());
}

#[test]
fn pasting_numbers_gives_a_number() {
    let mut macros = MacroTable::new();
    macros.define(function_macro(
        "CAT",
        &["a", "b"],
        vec![
            ident("a", 20),
            punct(Punctuator::HashConcat, 21),
            ident("b", 23),
        ],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("CAT", 0),
            punct(Punctuator::OpenParen, 3),
            number("1", 4),
            punct(Punctuator::Comma, 5),
            number("2", 6),
            punct(Punctuator::CloseParen, 7),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, PreTokenKind::Number("12".into()));
}

#[test]
fn pasting_with_an_empty_side_keeps_the_other() {
    let mut macros = MacroTable::new();
    macros.define(function_macro(
        "CAT",
        &["a", "b"],
        vec![
            ident("a", 20),
            punct(Punctuator::HashConcat, 21),
            ident("b", 23),
        ],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("CAT", 0),
            punct(Punctuator::OpenParen, 3),
            punct(Punctuator::Comma, 4),
            ident("x", 5),
            punct(Punctuator::CloseParen, 6),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(spell(&out), "x");
    assert!(diagnostics.is_empty());
}

#[test]
fn chained_pastes_fold_left() {
    let mut macros = MacroTable::new();
    macros.define(function_macro(
        "JOIN3",
        &["a", "b", "c"],
        vec![
            ident("a", 20),
            punct(Punctuator::HashConcat, 21),
            ident("b", 23),
            punct(Punctuator::HashConcat, 24),
            ident("c", 26),
        ],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("JOIN3", 0),
            punct(Punctuator::OpenParen, 5),
            ident("do", 6),
            punct(Punctuator::Comma, 8),
            ident("re", 9),
            punct(Punctuator::Comma, 11),
            ident("mi", 12),
            punct(Punctuator::CloseParen, 14),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].kind, PreTokenKind::Identifier("doremi".into()));
    assert_eq!(out[0].parts.len(), 3);
}

#[test]
fn stringize_joins_spellings() {
    let mut macros = MacroTable::new();
    macros.define(function_macro(
        "S",
        &["x"],
        vec![punct(Punctuator::Hash, 20), ident("x", 21)],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("S", 0),
            punct(Punctuator::OpenParen, 1),
            ident("a", 2),
            space(3),
            punct(Punctuator::Add, 4),
            space(5),
            PreTokenKind::StringLiteral(Encoding::Default, r#"q\"q"#.into()).at(at(6), 7),
            punct(Punctuator::CloseParen, 13),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(out.len(), 1);
    match &out[0].kind {
        PreTokenKind::StringLiteral(Encoding::Default, content) => {
            assert_eq!(content, r#"a + \"q\\\"q\""#);
        }
        other => panic!("expected string literal, got {:?}", other),
    }
}

#[test]
fn stringize_keeps_numeric_escapes_as_written() {
    let mut macros = MacroTable::new();
    macros.define(function_macro(
        "S",
        &["x"],
        vec![punct(Punctuator::Hash, 20), ident("x", 21)],
    ));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    // S("\x41") stringizes to the written text, not the decoded byte
    let out = expand_list(
        vec![
            ident("S", 0),
            punct(Punctuator::OpenParen, 1),
            PreTokenKind::StringLiteral(Encoding::Default, r"\x41".into()).at(at(2), 6),
            punct(Punctuator::CloseParen, 8),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(out.len(), 1);
    match &out[0].kind {
        PreTokenKind::StringLiteral(Encoding::Default, content) => {
            assert_eq!(content, r#"\"\\x41\""#);
        }
        other => panic!("expected string literal, got {:?}", other),
    }
}

#[test]
fn wrong_arity_reports_and_leaves_name() {
    let mut macros = MacroTable::new();
    macros.define(function_macro("TWO", &["a", "b"], vec![ident("a", 20)]));
    let unifier = RecordingUnifier::new();
    let diagnostics = Diagnostics::new();

    let out = expand_list(
        vec![
            ident("TWO", 0),
            punct(Punctuator::OpenParen, 3),
            number("1", 4),
            punct(Punctuator::CloseParen, 5),
        ],
        &macros,
        &unifier,
        &diagnostics,
    );

    assert_eq!(spell(&out), "TWO");
    assert_eq!(diagnostics.error_count(), 1);
}
