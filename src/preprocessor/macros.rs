use super::pre_token::PreToken;
use indexmap::IndexMap;

#[derive(Clone, Debug)]
pub struct Macro {
    pub name_token: PreToken,
    pub is_function: bool,
    pub formals: Vec<PreToken>,
    pub body: Vec<PreToken>,
}

impl Macro {
    pub fn name(&self) -> &str {
        self.name_token
            .identifier_name()
            .expect("macro name is an identifier")
    }

    pub fn formal_index(&self, name: &str) -> Option<usize> {
        self.formals
            .iter()
            .position(|formal| formal.is_identifier_named(name))
    }

    /// Definition inequality for the redefinition warning: kind, arity,
    /// formal spellings, or body spellings differ.
    pub fn differs_from(&self, other: &Macro) -> bool {
        self.is_function != other.is_function
            || self.formals.len() != other.formals.len()
            || !self
                .formals
                .iter()
                .zip(other.formals.iter())
                .all(|(a, b)| a.same_spelling(b))
            || self.body.len() != other.body.len()
            || !self
                .body
                .iter()
                .zip(other.body.iter())
                .all(|(a, b)| a.same_spelling(b))
    }
}

#[derive(Debug, Default)]
pub struct MacroTable {
    map: IndexMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, definition: Macro) {
        self.map.insert(definition.name().to_string(), definition);
    }

    pub fn undefine(&mut self, name: &str) -> Option<Macro> {
        self.map.shift_remove(name)
    }

    pub fn find(&self, name: &str) -> Option<&Macro> {
        self.map.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }
}
