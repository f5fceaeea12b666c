use super::expand::{expand_list, Expander, TokenSource};
use super::if_expr;
use super::lexer::{LexContext, Lexer};
use super::macros::{Macro, MacroTable};
use super::pre_token::{PreToken, PreTokenKind};
use super::punctuator::Punctuator;
use super::reader::CharReader;
use crate::diagnostics::Diagnostics;
use crate::equiv::Attribute;
use crate::link::Unifier;
use crate::origin::Tokid;
use crate::source_files::{FileKey, SourceFiles};
use itertools::Itertools;
use std::collections::VecDeque;
use std::path::PathBuf;

/*
   Directive processing.

   The conditional machinery: every evaluated #if pushes its result.
   While a branch is being skipped, skip_level counts the enclosing
   conditionals (1 = the branch being skipped, more = conditionals nested
   inside it); only the #if family is recognized, everything else is
   discarded unexamined. #elif with the branch already taken skips;
   otherwise it re-evaluates in place. #endif pops.

   Identifier tokens read outside skipped regions are classified into the
   equivalence store the moment they come out of the lexer; skipped text
   never touches the store.
*/

struct Conditional {
    taken: bool,
    else_seen: bool,
}

pub struct Directives<'a> {
    files: &'a SourceFiles,
    lexer: Lexer<'a>,
    macros: MacroTable,
    linker: &'a dyn Unifier,
    diagnostics: &'a Diagnostics,
    include_paths: &'a [PathBuf],
    at_bol: bool,
    skip_level: u32,
    conditionals: Vec<Conditional>,
    pending: VecDeque<PreToken>,
    lookahead: VecDeque<PreToken>,
}

impl<'a> Directives<'a> {
    pub fn new(
        files: &'a SourceFiles,
        master: FileKey,
        linker: &'a dyn Unifier,
        diagnostics: &'a Diagnostics,
        include_paths: &'a [PathBuf],
        trigraphs: bool,
    ) -> Self {
        let reader = CharReader::new(files, master, trigraphs);

        Self {
            files,
            lexer: Lexer::new(reader, diagnostics),
            macros: MacroTable::new(),
            linker,
            diagnostics,
            include_paths,
            at_bol: true,
            skip_level: 0,
            conditionals: Vec::new(),
            pending: VecDeque::new(),
            lookahead: VecDeque::new(),
        }
    }

    /// Files opened while preprocessing this translation unit.
    pub fn touched_files(&self) -> &[FileKey] {
        self.lexer.reader().touched()
    }

    pub fn next_token(&mut self) -> PreToken {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return token;
            }

            let token = self.next_raw(self.skip_level == 0);

            if self.at_bol {
                match &token.kind {
                    PreTokenKind::Whitespace | PreTokenKind::Newline => continue,
                    PreTokenKind::Punctuator(Punctuator::Hash) => {
                        self.process_directive();
                        continue;
                    }
                    PreTokenKind::EndOfInput => (),
                    _ => self.at_bol = false,
                }
            }

            if self.skip_level > 0 {
                match &token.kind {
                    PreTokenKind::Newline => self.at_bol = true,
                    PreTokenKind::EndOfInput => {
                        self.diagnostics
                            .error(token.origin(), "end of file within conditional directives");
                        return token;
                    }
                    _ => (),
                }
                continue;
            }

            match &token.kind {
                PreTokenKind::Newline => {
                    self.at_bol = true;
                    return token;
                }
                PreTokenKind::Identifier(name) => {
                    let expandable =
                        self.macros.is_defined(name) && !token.hideset.contains(name);
                    if !expandable {
                        return token;
                    }

                    let expanded = {
                        let mut source = StreamSource {
                            lexer: &mut self.lexer,
                            lookahead: &mut self.lookahead,
                            unifier: self.linker,
                        };
                        Expander::new(&self.macros, self.linker, self.diagnostics)
                            .expand(vec![token], &mut source)
                    };
                    self.pending.extend(expanded);
                }
                PreTokenKind::EndOfInput => {
                    if !self.conditionals.is_empty() {
                        self.diagnostics
                            .error(token.origin(), "end of file within conditional directives");
                        self.conditionals.clear();
                    }
                    return token;
                }
                _ => return token,
            }
        }
    }

    /// Next lexer token, with any leftover expansion lookahead drained
    /// first. Identifiers are classified while not skipping.
    fn next_raw(&mut self, classify: bool) -> PreToken {
        if let Some(token) = self.lookahead.pop_front() {
            return token;
        }

        let token = self.lexer.next_token();
        if classify {
            self.linker.classify_token(&token);
        }
        token
    }

    fn next_raw_nonspace(&mut self, classify: bool) -> PreToken {
        loop {
            let token = self.next_raw(classify);
            if !token.kind.is_whitespace() {
                return token;
            }
        }
    }

    fn read_directive_line(&mut self, classify: bool) -> Vec<PreToken> {
        let mut line = Vec::new();

        loop {
            let token = self.next_raw(classify);
            match token.kind {
                PreTokenKind::Newline | PreTokenKind::EndOfInput => break,
                _ => line.push(token),
            }
        }

        line
    }

    fn eat_to_eol(&mut self, classify: bool) {
        loop {
            let token = self.next_raw(classify);
            if matches!(token.kind, PreTokenKind::Newline | PreTokenKind::EndOfInput) {
                break;
            }
        }
    }

    // Skip the rest of the line unless the offending token ended it
    fn recover_to_eol(&mut self, offending: &PreToken) {
        if !matches!(
            offending.kind,
            PreTokenKind::Newline | PreTokenKind::EndOfInput
        ) {
            self.eat_to_eol(true);
        }
    }

    fn process_directive(&mut self) {
        let token = self.next_raw_nonspace(self.skip_level == 0);

        if self.skip_level > 0 {
            match token.identifier_name() {
                Some("if" | "ifdef" | "ifndef") => {
                    self.skip_level += 1;
                    self.eat_to_eol(false);
                }
                Some("elif") if self.skip_level == 1 => self.process_elif(token.origin()),
                Some("else") if self.skip_level == 1 => self.process_else(token.origin()),
                Some("endif") => self.process_endif(token.origin()),
                _ => {
                    if !matches!(
                        token.kind,
                        PreTokenKind::Newline | PreTokenKind::EndOfInput
                    ) {
                        self.eat_to_eol(false);
                    }
                }
            }
            return;
        }

        let origin = token.origin();

        match &token.kind {
            // A lone '#' is allowed
            PreTokenKind::Newline | PreTokenKind::EndOfInput => (),
            PreTokenKind::Identifier(name) => match name.as_str() {
                "define" => self.process_define(),
                "undef" => self.process_undef(),
                "include" => self.process_include(origin),
                "if" => self.process_if(origin),
                "ifdef" => self.process_ifdef(false, origin),
                "ifndef" => self.process_ifdef(true, origin),
                "elif" => self.process_elif(origin),
                "else" => self.process_else(origin),
                "endif" => self.process_endif(origin),
                "line" => self.process_line(origin),
                "error" => self.process_error_directive(origin),
                "warning" => self.process_warning_directive(origin),
                "pragma" => self.eat_to_eol(true),
                unknown => {
                    self.diagnostics.error(
                        origin,
                        format!("unknown preprocessor directive: #{}", unknown),
                    );
                    self.eat_to_eol(true);
                }
            },
            _ => {
                self.diagnostics.error(origin, "preprocessor syntax");
                self.recover_to_eol(&token);
            }
        }
    }

    fn process_define(&mut self) {
        let name_token = self.next_raw_nonspace(true);

        if !name_token.kind.is_identifier() {
            self.diagnostics
                .error(name_token.origin(), "invalid macro name");
            self.recover_to_eol(&name_token);
            return;
        }

        let name = name_token
            .identifier_name()
            .expect("checked above")
            .to_string();

        let mut definition = Macro {
            name_token,
            is_function: false,
            formals: Vec::new(),
            body: Vec::new(),
        };

        // Whitespace decides: `A(x)` is function-like, `A (x)` is an
        // object-like macro whose body starts with a parenthesis
        let mut token = self.next_raw(true);

        if token.is_punctuator(Punctuator::OpenParen) {
            definition.is_function = true;
            token = self.next_raw_nonspace(true);

            if token.is_punctuator(Punctuator::CloseParen) {
                token = self.next_raw(true);
            } else {
                loop {
                    if !token.kind.is_identifier() {
                        self.diagnostics
                            .error(token.origin(), "invalid macro parameter name");
                        self.recover_to_eol(&token);
                        return;
                    }

                    self.linker.set_attr(&token, Attribute::MacroArg);
                    definition.formals.push(token);

                    token = self.next_raw_nonspace(true);
                    if token.is_punctuator(Punctuator::CloseParen) {
                        token = self.next_raw(true);
                        break;
                    }
                    if !token.is_punctuator(Punctuator::Comma) {
                        self.diagnostics
                            .error(token.origin(), "invalid macro parameter punctuation");
                        self.recover_to_eol(&token);
                        return;
                    }
                    token = self.next_raw_nonspace(true);
                }
            }
        }

        // Body runs to end of line; edge whitespace is trimmed and inner
        // runs collapse to a single space
        let mut leading = true;
        while !matches!(token.kind, PreTokenKind::Newline | PreTokenKind::EndOfInput) {
            if leading && token.is_space() {
                token = self.next_raw(true);
                continue;
            }
            leading = false;

            if token.is_space() {
                if !definition.body.last().map_or(false, |t| t.is_space()) {
                    definition.body.push(token);
                }
            } else {
                if let Some(formal_at) = token
                    .identifier_name()
                    .and_then(|n| definition.formal_index(n))
                {
                    self.linker
                        .unify(&definition.formals[formal_at], &token);
                }
                definition.body.push(token);
            }

            token = self.next_raw(true);
        }

        while definition.body.last().map_or(false, |t| t.is_space()) {
            definition.body.pop();
        }

        if let Some(existing) = self.macros.find(&name) {
            if existing.differs_from(&definition) {
                self.diagnostics.warning(
                    definition.name_token.origin(),
                    format!("duplicate (different) definition of macro {}", name),
                );
            }
        }

        self.linker
            .set_attr(&definition.name_token, Attribute::Macro);
        self.macros.define(definition);
    }

    fn process_undef(&mut self) {
        let token = self.next_raw_nonspace(true);

        let Some(name) = token.identifier_name() else {
            self.diagnostics.error(token.origin(), "invalid macro name");
            self.recover_to_eol(&token);
            return;
        };

        let defined = match self.macros.find(name) {
            Some(definition) => {
                self.linker.unify(&definition.name_token, &token);
                true
            }
            None => false,
        };

        if defined {
            let name = name.to_string();
            self.macros.undefine(&name);
        }

        self.eat_to_eol(true);
    }

    fn process_include(&mut self, origin: Tokid) {
        self.lexer.set_context(LexContext::HeaderName);
        let line = self.read_directive_line(true);
        self.lexer.set_context(LexContext::Normal);

        let meaningful: Vec<PreToken> =
            line.into_iter().filter(|t| !t.is_space()).collect();

        // An identifier-led include line is macro-expanded first
        let meaningful: Vec<PreToken> = match meaningful.first() {
            Some(first) if first.kind.is_identifier() => {
                expand_list(meaningful, &self.macros, self.linker, self.diagnostics)
                    .into_iter()
                    .filter(|t| !t.is_space())
                    .collect()
            }
            _ => meaningful,
        };

        let [target] = meaningful.as_slice() else {
            self.diagnostics.error(origin, "bad #include syntax");
            return;
        };

        let (name, quoted) = match &target.kind {
            PreTokenKind::HeaderName(name) => (name, false),
            PreTokenKind::StringLiteral(_, name) => (name, true),
            _ => {
                self.diagnostics.error(origin, "bad #include syntax");
                return;
            }
        };

        match self.resolve_include(name, quoted) {
            Some(key) => self.lexer.reader_mut().push_include(key),
            None => self.diagnostics.error(
                target.origin(),
                format!("include file not found: {}", name),
            ),
        }
    }

    /// `"name"` searches next to the including file, then the include
    /// path; `<name>` searches the include path only. Files already in
    /// the registry satisfy a candidate without touching the disk.
    fn resolve_include(&self, name: &str, quoted: bool) -> Option<FileKey> {
        let mut candidates: Vec<PathBuf> = Vec::new();

        if quoted {
            let current = self.lexer.reader().current_file();
            match self.files.get(current).path().parent() {
                Some(parent) => candidates.push(parent.join(name)),
                None => candidates.push(PathBuf::from(name)),
            }
        }

        for dir in self.include_paths {
            candidates.push(dir.join(name));
        }

        if quoted {
            candidates.push(PathBuf::from(name));
        }

        for candidate in candidates {
            if let Some(key) = self.files.lookup(&candidate) {
                return Some(key);
            }
            if candidate.is_file() {
                return self.files.load(&candidate).ok();
            }
        }

        None
    }

    fn process_if(&mut self, origin: Tokid) {
        let line = self.read_directive_line(true);
        let value = if_expr::evaluate(line, &self.macros, self.linker, self.diagnostics, origin);

        self.conditionals.push(Conditional {
            taken: value,
            else_seen: false,
        });
        self.skip_level = if value { 0 } else { 1 };
    }

    fn process_ifdef(&mut self, invert: bool, origin: Tokid) {
        let line = self.read_directive_line(true);
        let name_token = line.iter().find(|t| !t.is_space());

        let defined = match name_token {
            Some(token) if token.kind.is_identifier() => {
                let name = token.identifier_name().expect("checked above");
                match self.macros.find(name) {
                    Some(definition) => {
                        self.linker.unify(&definition.name_token, token);
                        true
                    }
                    None => {
                        self.linker.set_attr(token, Attribute::UndefinedMacro);
                        false
                    }
                }
            }
            _ => {
                self.diagnostics
                    .error(origin, "expected macro name in conditional directive");
                false
            }
        };

        let value = defined ^ invert;
        self.conditionals.push(Conditional {
            taken: value,
            else_seen: false,
        });
        self.skip_level = if value { 0 } else { 1 };
    }

    fn process_elif(&mut self, origin: Tokid) {
        if self.conditionals.is_empty() {
            self.diagnostics.error(origin, "#elif without #if");
            self.eat_to_eol(self.skip_level == 0);
            return;
        }

        if self.skip_level > 1 {
            self.eat_to_eol(false);
            return;
        }

        if self.conditionals.last().expect("checked above").taken {
            // An earlier branch was chosen; this one is dead regardless
            self.skip_level = 1;
            self.eat_to_eol(false);
            return;
        }

        self.skip_level = 0;
        let line = self.read_directive_line(true);
        let value = if_expr::evaluate(line, &self.macros, self.linker, self.diagnostics, origin);

        let top = self.conditionals.last_mut().expect("checked above");
        top.taken = value;
        self.skip_level = if value { 0 } else { 1 };
    }

    fn process_else(&mut self, origin: Tokid) {
        if self.conditionals.is_empty() {
            self.diagnostics.error(origin, "#else without #if");
            self.eat_to_eol(self.skip_level == 0);
            return;
        }

        if self.skip_level > 1 {
            self.eat_to_eol(false);
            return;
        }

        let top = self.conditionals.last_mut().expect("checked above");

        if top.else_seen {
            self.diagnostics.warning(origin, "duplicate #else");
            self.skip_level = 1;
            self.eat_to_eol(false);
            return;
        }

        top.else_seen = true;
        if top.taken {
            self.skip_level = 1;
        } else {
            top.taken = true;
            self.skip_level = 0;
        }
        self.eat_to_eol(false);
    }

    fn process_endif(&mut self, origin: Tokid) {
        if self.conditionals.is_empty() {
            self.diagnostics.error(origin, "#endif without #if");
            self.eat_to_eol(self.skip_level == 0);
            return;
        }

        if self.skip_level <= 1 {
            self.conditionals.pop();
        }
        if self.skip_level >= 1 {
            self.skip_level -= 1;
        }
        self.eat_to_eol(false);
    }

    fn process_line(&mut self, origin: Tokid) {
        let line = self.read_directive_line(true);

        match line.iter().find(|t| !t.is_space()) {
            Some(token) if token.kind.is_number() => (),
            Some(token) => self
                .diagnostics
                .error(token.origin(), "expected line number after #line"),
            None => self
                .diagnostics
                .error(origin, "expected line number after #line"),
        }
    }

    fn process_error_directive(&mut self, origin: Tokid) {
        let text = self.directive_text();
        self.diagnostics.error(origin, format!("#error {}", text));
    }

    fn process_warning_directive(&mut self, origin: Tokid) {
        let text = self.directive_text();
        self.diagnostics.warning(origin, format!("#warning {}", text));
    }

    fn directive_text(&mut self) -> String {
        let line = self.read_directive_line(true);
        line.iter().map(|t| t.to_string()).join("").trim().to_string()
    }
}

/// Pulls raw tokens for argument gathering when an invocation extends
/// past the line that named the macro. Unconsumed peeks stay in the
/// directive processor's lookahead.
struct StreamSource<'s, 'a> {
    lexer: &'s mut Lexer<'a>,
    lookahead: &'s mut VecDeque<PreToken>,
    unifier: &'s dyn Unifier,
}

impl TokenSource for StreamSource<'_, '_> {
    fn next_token(&mut self) -> Option<PreToken> {
        if let Some(token) = self.lookahead.pop_front() {
            return Some(token);
        }

        let token = self.lexer.next_token();
        if token.kind.is_end_of_input() {
            return None;
        }

        self.unifier.classify_token(&token);
        Some(token)
    }

    fn peek_token(&mut self, index: usize) -> Option<&PreToken> {
        while self.lookahead.len() <= index {
            let token = self.lexer.next_token();
            if token.kind.is_end_of_input() {
                return None;
            }
            self.unifier.classify_token(&token);
            self.lookahead.push_back(token);
        }

        self.lookahead.get(index)
    }
}
