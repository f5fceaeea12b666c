use crate::equiv::{Attribute, EClass, EcStore};
use crate::source_files::SourceFiles;
use itertools::Itertools;

/*
   Queries over the finished analysis: the identifier table, unused
   identifiers, and per-file metrics. An identifier is worth listing when
   it has more than one occurrence, or when it is writable and scoped
   (macro, file-local, or externally visible) — single-occurrence
   keywords and literal-like names stay out of the way.
*/

#[derive(Clone, Debug)]
pub struct IdentifierEntry {
    pub name: String,
    pub occurrences: usize,
    pub crosses_files: bool,
    pub readonly: bool,
    pub is_macro: bool,
}

pub struct Report<'a> {
    files: &'a SourceFiles,
    ecs: &'a EcStore,
}

impl<'a> Report<'a> {
    pub fn new(files: &'a SourceFiles, ecs: &'a EcStore) -> Self {
        Self { files, ecs }
    }

    fn spelling_of(&self, class: &EClass) -> String {
        let member = class.representative();
        let content = self.files.get(member.file).content();
        let start = member.offset as usize;
        let end = (start + class.len() as usize).min(content.len());
        content[start..end].to_string()
    }

    fn worth_listing(class: &EClass) -> bool {
        class.size() > 1
            || (!class.test_attr(Attribute::Readonly)
                && (class.test_attr(Attribute::Macro)
                    || class.test_attr(Attribute::FileScope)
                    || class.test_attr(Attribute::LinkageScope)))
    }

    pub fn identifiers(&self) -> Vec<IdentifierEntry> {
        let mut entries: Vec<IdentifierEntry> = self
            .ecs
            .classes()
            .filter(|(_, class)| Self::worth_listing(class))
            .map(|(_, class)| IdentifierEntry {
                name: self.spelling_of(class),
                occurrences: class.size(),
                crosses_files: class.members_by_file().len() > 1,
                readonly: class.test_attr(Attribute::Readonly),
                is_macro: class.test_attr(Attribute::Macro),
            })
            .collect();

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Writable, scoped identifiers with a single occurrence.
    pub fn unused(&self) -> Vec<IdentifierEntry> {
        self.identifiers()
            .into_iter()
            .filter(|entry| entry.occurrences == 1 && !entry.readonly)
            .collect()
    }

    pub fn print_summary(&self) {
        let file_count = self.files.iter().count();
        let class_count = self.ecs.class_count();
        let identifier_occurrences: u32 = self
            .files
            .iter()
            .map(|(_, file)| file.identifier_occurrences())
            .sum();

        println!(
            "{} files, {} identifier occurrences, {} equivalence classes",
            file_count, class_count, identifier_occurrences
        );

        for (_, file) in self.files.iter() {
            println!(
                "  {}: {} lines, {} bytes, {} identifier occurrences{}",
                file.filename(),
                file.lines(),
                file.bytes(),
                file.identifier_occurrences(),
                if file.is_readonly() { " (read-only)" } else { "" }
            );
        }
    }

    pub fn print_identifiers(&self) {
        for entry in self.identifiers() {
            let mut notes = Vec::new();
            if entry.is_macro {
                notes.push("macro");
            }
            if entry.readonly {
                notes.push("read-only");
            }
            if entry.crosses_files {
                notes.push("crosses files");
            }

            println!(
                "{} ({} occurrence{}{}{})",
                entry.name,
                entry.occurrences,
                if entry.occurrences == 1 { "" } else { "s" },
                if notes.is_empty() { "" } else { "; " },
                notes.iter().join(", ")
            );
        }
    }

    pub fn print_unused(&self) {
        for entry in self.unused() {
            println!("{}", entry.name);
        }
    }
}
