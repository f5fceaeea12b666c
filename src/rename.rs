use crate::equiv::{Attribute, EClass};
use crate::preprocessor::lexer::{is_identifier_continue, is_identifier_start};
use crate::source_files::FileKey;
use std::fmt::Display;

/*
   Corpus-wide renaming. A plan lists every origin range of a class,
   ordered by file and offset; applying the rewrites back to front keeps
   the offsets valid. Classes that reach into read-only files refuse.
*/

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rewrite {
    pub file: FileKey,
    pub offset: u32,
    pub len: u32,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenameError {
    Readonly,
    InvalidName(String),
}

impl Display for RenameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenameError::Readonly => {
                write!(f, "the identifier occurs in a read-only file")
            }
            RenameError::InvalidName(name) => {
                write!(f, "{:?} is not a valid C identifier", name)
            }
        }
    }
}

pub fn rename_plan(class: &EClass, new_name: &str) -> Result<Vec<Rewrite>, RenameError> {
    if !is_valid_identifier(new_name) {
        return Err(RenameError::InvalidName(new_name.to_string()));
    }

    if class.test_attr(Attribute::Readonly) {
        return Err(RenameError::Readonly);
    }

    let mut plan = Vec::with_capacity(class.size());

    for (file, offsets) in class.members_by_file() {
        for offset in offsets {
            plan.push(Rewrite {
                file,
                offset,
                len: class.len(),
                text: new_name.to_string(),
            });
        }
    }

    Ok(plan)
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_identifier_start(first) => chars.all(is_identifier_continue),
        _ => false,
    }
}
