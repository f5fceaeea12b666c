use super::encoding::Encoding;
use super::punctuator::Punctuator;
use crate::origin::{Tokid, Tpart};
use derive_more::IsVariant;
use smallvec::SmallVec;
use std::fmt::Display;
use std::rc::Rc;

/// Origin ranges of a token. Almost always a single contiguous range;
/// line splicing and `##` pasting produce more.
pub type Parts = SmallVec<[Tpart; 1]>;

#[derive(Clone, Debug)]
pub struct PreToken {
    pub kind: PreTokenKind,
    pub parts: Parts,
    pub hideset: HideSet,
}

#[derive(Clone, Debug, PartialEq, IsVariant)]
pub enum PreTokenKind {
    Identifier(String),
    Number(String),
    CharacterConstant(Encoding, String),
    StringLiteral(Encoding, String),
    HeaderName(String),
    Punctuator(Punctuator),
    Whitespace,
    Newline,
    Other(char),
    /// Stands in for an empty macro argument during substitution; never
    /// reaches the output stream.
    Placeholder,
    EndOfInput,
}

impl PreTokenKind {
    pub fn at(self, start: Tokid, len: u32) -> PreToken {
        PreToken {
            kind: self,
            parts: SmallVec::from_elem(Tpart::new(start, len), 1),
            hideset: HideSet::default(),
        }
    }

    pub fn with_parts(self, parts: Parts) -> PreToken {
        PreToken {
            kind: self,
            parts,
            hideset: HideSet::default(),
        }
    }
}

impl PreToken {
    /// Coordinate of the first constituent byte, for diagnostics.
    pub fn origin(&self) -> Tokid {
        self.parts
            .first()
            .expect("token has at least one origin range")
            .start
    }

    pub fn is_space(&self) -> bool {
        matches!(self.kind, PreTokenKind::Whitespace | PreTokenKind::Newline)
    }

    pub fn identifier_name(&self) -> Option<&str> {
        match &self.kind {
            PreTokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_identifier_named(&self, name: &str) -> bool {
        self.identifier_name() == Some(name)
    }

    pub fn is_punctuator(&self, punctuator: Punctuator) -> bool {
        matches!(&self.kind, PreTokenKind::Punctuator(p) if *p == punctuator)
    }

    /// Spelling equality; origin ranges and hide-sets do not participate.
    pub fn same_spelling(&self, other: &PreToken) -> bool {
        self.kind == other.kind
    }
}

impl Display for PreToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl Display for PreTokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreTokenKind::Identifier(name) => f.write_str(name),
            PreTokenKind::Number(number) => f.write_str(number),
            // Literal contents are stored as spelled, escapes included
            PreTokenKind::CharacterConstant(encoding, content) => {
                write!(f, "{}'{}'", encoding, content)
            }
            PreTokenKind::StringLiteral(encoding, content) => {
                write!(f, "{}\"{}\"", encoding, content)
            }
            PreTokenKind::HeaderName(name) => write!(f, "<{}>", name),
            PreTokenKind::Punctuator(punctuator) => punctuator.fmt(f),
            PreTokenKind::Whitespace => f.write_str(" "),
            PreTokenKind::Newline => f.write_str("\n"),
            PreTokenKind::Other(c) => write!(f, "{}", c),
            PreTokenKind::Placeholder => Ok(()),
            PreTokenKind::EndOfInput => Ok(()),
        }
    }
}

/*
   Hide-sets.

   Every token carries the set of macro names that were being replaced
   when it was created; a token never triggers an expansion of a name in
   its own hide-set. The set is a persistent cons list so that stamping a
   whole replacement sequence shares structure instead of cloning.
*/

#[derive(Clone, Debug, Default)]
pub struct HideSet(Option<Rc<HideNode>>);

#[derive(Debug)]
struct HideNode {
    name: String,
    rest: HideSet,
}

impl HideSet {
    pub fn contains(&self, name: &str) -> bool {
        let mut current = self;
        while let Some(node) = &current.0 {
            if node.name == name {
                return true;
            }
            current = &node.rest;
        }
        false
    }

    pub fn with(&self, name: &str) -> HideSet {
        if self.contains(name) {
            return self.clone();
        }

        HideSet(Some(Rc::new(HideNode {
            name: name.to_string(),
            rest: self.clone(),
        })))
    }

    pub fn union(&self, other: &HideSet) -> HideSet {
        let mut result = self.clone();
        let mut current = other;
        while let Some(node) = &current.0 {
            result = result.with(&node.name);
            current = &node.rest;
        }
        result
    }
}

/// Accumulates per-byte origins into maximal contiguous ranges. A line
/// splice or a file boundary inside a token starts a new range.
#[derive(Debug, Default)]
pub struct PartsBuilder {
    parts: Parts,
}

impl PartsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tokid: Tokid) {
        if let Some(last) = self.parts.last_mut() {
            if last.abuts(tokid) {
                last.len += 1;
                return;
            }
        }

        self.parts.push(Tpart::new(tokid, 1));
    }

    pub fn finish(self) -> Parts {
        self.parts
    }
}
