use crate::equiv::{Attribute, EcId, EcStore};
use crate::origin::{homogenize, Tpart};
use crate::preprocessor::PreToken;
use crate::source_files::SourceFiles;
use std::cell::{Cell, RefCell};

/*
   The seam between preprocessing and parsing.

   The parser proves that two name occurrences denote the same entity and
   calls `unify`; everything else about equivalence classes stays behind
   this trait, so the preprocessor can be exercised with a recording stub
   instead of a real class store.
*/

pub trait Unifier {
    /// Record an identifier occurrence, creating classes for its origin
    /// ranges as needed.
    fn classify_token(&self, token: &PreToken);

    /// Merge the classes of two tokens range by range.
    fn unify(&self, def: &PreToken, reference: &PreToken);

    /// OR an attribute onto every class the token touches.
    fn set_attr(&self, token: &PreToken, attribute: Attribute);
}

pub struct Linker<'a> {
    files: &'a SourceFiles,
    ecs: RefCell<EcStore>,
    current_project: Cell<Option<u32>>,
}

impl<'a> Linker<'a> {
    pub fn new(files: &'a SourceFiles) -> Self {
        Self {
            files,
            ecs: RefCell::new(EcStore::new()),
            current_project: Cell::new(None),
        }
    }

    pub fn set_current_project(&self, ordinal: Option<u32>) {
        self.current_project.set(ordinal);
    }

    pub fn into_store(self) -> EcStore {
        self.ecs.into_inner()
    }

    fn classify_part(&self, ecs: &mut EcStore, part: Tpart) -> EcId {
        let id = ecs.classify(part.start, part.len);

        if self.files.get(part.start.file).is_readonly() {
            ecs.set_attr(id, Attribute::Readonly);
        }

        if let Some(ordinal) = self.current_project.get() {
            ecs.set_attr(id, Attribute::Project(ordinal));
        }

        id
    }
}

impl Unifier for Linker<'_> {
    fn classify_token(&self, token: &PreToken) {
        if !token.kind.is_identifier() {
            return;
        }

        let mut ecs = self.ecs.borrow_mut();
        for part in token.parts.iter() {
            self.classify_part(&mut ecs, *part);
        }

        self.files.get(token.origin().file).record_identifier();
    }

    fn unify(&self, def: &PreToken, reference: &PreToken) {
        let (def_parts, ref_parts) = homogenize(&def.parts, &reference.parts);

        let mut ecs = self.ecs.borrow_mut();
        for (def_part, ref_part) in def_parts.into_iter().zip(ref_parts) {
            let a = self.classify_part(&mut ecs, def_part);
            let b = self.classify_part(&mut ecs, ref_part);
            ecs.merge(a, b);
        }
    }

    fn set_attr(&self, token: &PreToken, attribute: Attribute) {
        let mut ecs = self.ecs.borrow_mut();
        for part in token.parts.iter() {
            let id = self.classify_part(&mut ecs, *part);
            ecs.set_attr(id, attribute);
        }
    }
}

/// Records every call; stands in for the class store when testing the
/// preprocessor in isolation.
#[derive(Debug, Default)]
pub struct RecordingUnifier {
    pub classified: RefCell<Vec<String>>,
    pub unified: RefCell<Vec<(String, String)>>,
    pub attributes: RefCell<Vec<(String, Attribute)>>,
}

impl RecordingUnifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Unifier for RecordingUnifier {
    fn classify_token(&self, token: &PreToken) {
        self.classified.borrow_mut().push(token.to_string());
    }

    fn unify(&self, def: &PreToken, reference: &PreToken) {
        self.unified
            .borrow_mut()
            .push((def.to_string(), reference.to_string()));
    }

    fn set_attr(&self, token: &PreToken, attribute: Attribute) {
        self.attributes
            .borrow_mut()
            .push((token.to_string(), attribute));
    }
}

/// The consumer of the preprocessed token stream. The C grammar proper
/// lives outside this crate; the default consumer discards tokens and
/// leaves all unification to the preprocessor itself.
pub trait Parser {
    fn feed(&mut self, token: &PreToken, unifier: &dyn Unifier);

    fn finish(&mut self, unifier: &dyn Unifier) {
        let _ = unifier;
    }
}

pub struct NullParser;

impl Parser for NullParser {
    fn feed(&mut self, token: &PreToken, unifier: &dyn Unifier) {
        let _ = (token, unifier);
    }
}
