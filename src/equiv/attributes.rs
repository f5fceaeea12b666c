use std::fmt::Display;

/*
   Attribute bits shared by files and equivalence classes.

   The fixed attributes occupy the low bits; one additional bit per
   configured project is allocated dynamically from FIRST_PROJECT_BIT
   upward, the way the original corpus analyzer numbered its projects.
   Bits are monotone: once set on a class they are never cleared, and
   merging classes ORs them together.
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Attribute {
    Readonly,
    CompilationUnit,
    Macro,
    UndefinedMacro,
    MacroArg,
    Ordinary,
    SueTag,
    SuMember,
    Label,
    Typedef,
    Enumeration,
    FileScope,
    LinkageScope,
    Project(u32),
}

impl Attribute {
    const FIRST_PROJECT_BIT: u32 = 16;

    pub const MAX_PROJECTS: u32 = u64::BITS - Self::FIRST_PROJECT_BIT;

    fn bit(self) -> u32 {
        match self {
            Attribute::Readonly => 0,
            Attribute::CompilationUnit => 1,
            Attribute::Macro => 2,
            Attribute::UndefinedMacro => 3,
            Attribute::MacroArg => 4,
            Attribute::Ordinary => 5,
            Attribute::SueTag => 6,
            Attribute::SuMember => 7,
            Attribute::Label => 8,
            Attribute::Typedef => 9,
            Attribute::Enumeration => 10,
            Attribute::FileScope => 11,
            Attribute::LinkageScope => 12,
            Attribute::Project(ordinal) => {
                assert!(ordinal < Self::MAX_PROJECTS, "too many projects");
                Self::FIRST_PROJECT_BIT + ordinal
            }
        }
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attribute::Readonly => write!(f, "read-only"),
            Attribute::CompilationUnit => write!(f, "compilation unit"),
            Attribute::Macro => write!(f, "macro"),
            Attribute::UndefinedMacro => write!(f, "undefined macro"),
            Attribute::MacroArg => write!(f, "macro argument"),
            Attribute::Ordinary => write!(f, "ordinary identifier"),
            Attribute::SueTag => write!(f, "struct/union/enum tag"),
            Attribute::SuMember => write!(f, "struct/union member"),
            Attribute::Label => write!(f, "label"),
            Attribute::Typedef => write!(f, "typedef"),
            Attribute::Enumeration => write!(f, "enumeration constant"),
            Attribute::FileScope => write!(f, "file scope"),
            Attribute::LinkageScope => write!(f, "linkage scope"),
            Attribute::Project(ordinal) => write!(f, "project #{}", ordinal),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AttrSet(u64);

impl AttrSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn with(mut self, attribute: Attribute) -> Self {
        self.set(attribute);
        self
    }

    pub fn set(&mut self, attribute: Attribute) {
        self.0 |= 1 << attribute.bit();
    }

    pub fn test(self, attribute: Attribute) -> bool {
        self.0 & (1 << attribute.bit()) != 0
    }

    pub fn union_with(&mut self, other: AttrSet) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}
