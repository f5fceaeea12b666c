mod config;

pub use config::{ConfigError, ProjectConfig, WorkspaceConfig};

use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
use crate::equiv::{Attribute, EcStore};
use crate::link::{Linker, Parser};
use crate::preprocessor::Directives;
use crate::source_files::SourceFiles;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/*
   The corpus driver: projects × translation units. Each unit gets a
   fresh preprocessor (macro table, conditional stack, include stack);
   the file registry, the diagnostics, and the equivalence-class forest
   are shared across the whole run, which is what makes cross-unit
   identifier queries possible.
*/

pub struct Driver<'a> {
    files: &'a SourceFiles,
    diagnostics: &'a Diagnostics,
    linker: Linker<'a>,
}

impl<'a> Driver<'a> {
    pub fn new(files: &'a SourceFiles, diagnostics: &'a Diagnostics) -> Self {
        Self {
            files,
            diagnostics,
            linker: Linker::new(files),
        }
    }

    pub fn into_store(self) -> EcStore {
        self.linker.into_store()
    }

    pub fn process(&self, config: &WorkspaceConfig, parser: &mut dyn Parser) {
        for project in &config.projects {
            for prefix in &project.readonly {
                self.files.add_readonly_rule(prefix.clone());
            }
        }

        for (ordinal, project) in config.projects.iter().enumerate() {
            let ordinal = ordinal as u32;
            self.linker.set_current_project(Some(ordinal));

            for unit in collect_units(&project.units) {
                self.process_unit(&unit, project, ordinal, config.trigraphs, parser);
            }
        }

        self.linker.set_current_project(None);
    }

    fn process_unit(
        &self,
        unit: &Path,
        project: &ProjectConfig,
        ordinal: u32,
        trigraphs: bool,
        parser: &mut dyn Parser,
    ) {
        let master = match self.files.load(unit) {
            Ok(key) => key,
            Err(error) => {
                self.diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    origin: None,
                    message: format!("cannot open {}: {}", unit.display(), error),
                });
                return;
            }
        };

        self.files.get(master).set_attr(Attribute::CompilationUnit);

        let mut directives = Directives::new(
            self.files,
            master,
            &self.linker,
            self.diagnostics,
            &project.include_paths,
            trigraphs,
        );

        loop {
            let token = directives.next_token();
            if token.kind.is_end_of_input() {
                break;
            }
            parser.feed(&token, &self.linker);
        }
        parser.finish(&self.linker);

        for key in directives.touched_files() {
            self.files.get(*key).set_attr(Attribute::Project(ordinal));
        }
    }
}

/// A unit entry naming a directory stands for every `.c` file under it.
fn collect_units(units: &[PathBuf]) -> Vec<PathBuf> {
    let mut collected = Vec::new();

    for unit in units {
        if unit.is_dir() {
            for entry in WalkDir::new(unit)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                let is_c_source = entry.file_type().is_file()
                    && entry.path().extension().map_or(false, |ext| ext == "c");
                if is_c_source {
                    collected.push(entry.path().to_path_buf());
                }
            }
        } else {
            collected.push(unit.clone());
        }
    }

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{NullParser, Unifier};
    use crate::origin::Tokid;
    use crate::preprocessor::PreToken;
    use crate::rename::{rename_plan, RenameError};
    use crate::source_files::FileKey;
    use indoc::indoc;

    struct Collecting {
        tokens: Vec<String>,
    }

    impl Parser for Collecting {
        fn feed(&mut self, token: &PreToken, _unifier: &dyn Unifier) {
            if !token.is_space() {
                self.tokens.push(token.to_string());
            }
        }
    }

    fn run(
        sources: &[(&str, &str)],
        config_json: &str,
        parser: &mut dyn Parser,
    ) -> (SourceFiles, Diagnostics, EcStore) {
        let files = SourceFiles::new();
        let diagnostics = Diagnostics::new();
        let config = WorkspaceConfig::from_json(config_json).unwrap();

        // Read-only prefixes must be known before registration
        for project in &config.projects {
            for prefix in &project.readonly {
                files.add_readonly_rule(prefix.clone());
            }
        }

        for (path, content) in sources.iter().copied() {
            files.add(path.into(), content.into());
        }

        let store = {
            let driver = Driver::new(&files, &diagnostics);
            driver.process(&config, parser);
            driver.into_store()
        };

        (files, diagnostics, store)
    }

    fn key_of(files: &SourceFiles, path: &str) -> FileKey {
        files.lookup(Path::new(path)).expect("file was registered")
    }

    const SINGLE_PROJECT: &str = r#"{"projects": [{"name": "p", "units": ["b.c"]}]}"#;

    #[test]
    fn macro_use_across_files_lands_in_one_class() {
        let (files, diagnostics, store) = run(
            &[
                ("a.h", "#define MAX 100\n"),
                ("b.c", "#include \"a.h\"\nint x = MAX;\n"),
            ],
            SINGLE_PROJECT,
            &mut NullParser,
        );

        assert!(diagnostics.is_empty());

        let a_h = key_of(&files, "a.h");
        let b_c = key_of(&files, "b.c");

        // "#define MAX 100": MAX at offset 8; "int x = MAX;": MAX at 23
        let definition = store
            .class_of(Tokid::new(a_h, 8))
            .expect("definition classified");
        assert_eq!(definition.len(), 3);
        assert!(definition.test_attr(Attribute::Macro));
        assert!(definition.members().contains(&Tokid::new(b_c, 23)));

        assert_eq!(
            store.lookup(Tokid::new(a_h, 8)),
            store.lookup(Tokid::new(b_c, 23))
        );
    }

    #[test]
    fn conditional_branches_select_tokens_and_tag_macros() {
        let mut parser = Collecting { tokens: Vec::new() };
        let (files, diagnostics, store) = run(
            &[(
                "b.c",
                indoc! {"
                    #define X
                    #if defined(X) && !defined(Y)
                    int a;
                    #else
                    int b;
                    #endif
                "},
            )],
            SINGLE_PROJECT,
            &mut parser,
        );

        assert!(diagnostics.is_empty());
        assert!(parser.tokens.contains(&"a".to_string()));
        assert!(!parser.tokens.contains(&"b".to_string()));

        let b_c = key_of(&files, "b.c");
        // "#define X": X at offset 8
        let x_class = store.class_of(Tokid::new(b_c, 8)).expect("X classified");
        assert!(x_class.test_attr(Attribute::Macro));
        assert!(x_class.size() >= 2);

        // Y was only ever tested, never defined
        let y_offset = "#define X\n#if defined(X) && !defined(".len() as u32;
        let y_class = store
            .class_of(Tokid::new(b_c, y_offset))
            .expect("Y classified");
        assert!(y_class.test_attr(Attribute::UndefinedMacro));
    }

    #[test]
    fn readonly_headers_poison_their_classes() {
        let (files, diagnostics, store) = run(
            &[
                ("sys/types.h", "#define COUNT 10\n"),
                ("b.c", "#include \"sys/types.h\"\nint n = COUNT;\n"),
            ],
            r#"{"projects": [{"name": "p", "units": ["b.c"], "readonly": ["sys"]}]}"#,
            &mut NullParser,
        );

        assert!(diagnostics.is_empty());
        let sys = key_of(&files, "sys/types.h");
        assert!(files.get(sys).is_readonly());

        let class = store
            .class_of(Tokid::new(sys, 8))
            .expect("COUNT classified");
        assert!(class.test_attr(Attribute::Readonly));
        assert_eq!(rename_plan(class, "SIZE"), Err(RenameError::Readonly));
    }

    #[test]
    fn shared_headers_collect_every_project_bit() {
        let (files, diagnostics, store) = run(
            &[
                ("common.h", "#define SHARED 1\n"),
                ("one.c", "#include \"common.h\"\nint a = SHARED;\n"),
                ("two.c", "#include \"common.h\"\nint b = SHARED;\n"),
            ],
            r#"{"projects": [
                {"name": "first", "units": ["one.c"]},
                {"name": "second", "units": ["two.c"]}
            ]}"#,
            &mut NullParser,
        );

        assert!(diagnostics.is_empty());

        let header = files.get(key_of(&files, "common.h"));
        assert!(header.has_attr(Attribute::Project(0)));
        assert!(header.has_attr(Attribute::Project(1)));

        let one = files.get(key_of(&files, "one.c"));
        assert!(one.has_attr(Attribute::Project(0)));
        assert!(!one.has_attr(Attribute::Project(1)));
        assert!(one.has_attr(Attribute::CompilationUnit));

        let shared = store
            .class_of(Tokid::new(key_of(&files, "common.h"), 8))
            .expect("SHARED classified");
        assert!(shared.attrs().test(Attribute::Project(0)));
        assert!(shared.attrs().test(Attribute::Project(1)));
        assert_eq!(shared.members_by_file().len(), 3);
    }

    #[test]
    fn class_forest_survives_across_units() {
        let (files, diagnostics, store) = run(
            &[
                ("a.h", "#define MAX 100\n"),
                ("one.c", "#include \"a.h\"\nint a = MAX;\n"),
                ("two.c", "#include \"a.h\"\nint b = MAX;\n"),
            ],
            r#"{"projects": [{"name": "p", "units": ["one.c", "two.c"]}]}"#,
            &mut NullParser,
        );

        assert!(diagnostics.is_empty());

        let class = store
            .class_of(Tokid::new(key_of(&files, "a.h"), 8))
            .expect("MAX classified");

        // Definition plus one use per unit
        assert_eq!(class.size(), 3);
        assert_eq!(class.members_by_file().len(), 3);
    }

    #[test]
    fn macro_table_resets_between_units() {
        let mut parser = Collecting { tokens: Vec::new() };
        let (_, diagnostics, _) = run(
            &[
                ("one.c", "#define FOO 42\n"),
                ("two.c", "int y = FOO;\n"),
            ],
            r#"{"projects": [{"name": "p", "units": ["one.c", "two.c"]}]}"#,
            &mut parser,
        );

        assert!(diagnostics.is_empty());
        // FOO from the first unit does not leak into the second
        assert!(parser.tokens.contains(&"FOO".to_string()));
        assert!(!parser.tokens.contains(&"42".to_string()));
    }

    #[test]
    fn renaming_then_reanalyzing_reproduces_the_partition() {
        let sources = [
            ("a.h", "#define MAX 100\n"),
            ("b.c", "#include \"a.h\"\nint x = MAX;\n"),
        ];
        let (files, _, store) = run(&sources, SINGLE_PROJECT, &mut NullParser);

        let class = store
            .class_of(Tokid::new(key_of(&files, "a.h"), 8))
            .expect("MAX classified");
        let plan = rename_plan(class, "LIMIT").unwrap();
        assert_eq!(plan.len(), 2);

        // Apply the rewrites (back to front per file keeps offsets valid)
        let mut rewritten: std::collections::HashMap<&str, String> = sources
            .iter()
            .map(|(path, content)| (*path, (*content).to_string()))
            .collect();
        for rewrite in plan.iter().rev() {
            let path = files.get(rewrite.file).filename().to_string();
            let content = rewritten.get_mut(path.as_str()).unwrap();
            let start = rewrite.offset as usize;
            let end = start + rewrite.len as usize;
            content.replace_range(start..end, &rewrite.text);
        }

        assert_eq!(rewritten["a.h"], "#define LIMIT 100\n");
        assert_eq!(rewritten["b.c"], "#include \"a.h\"\nint x = LIMIT;\n");

        // The renamed corpus partitions the same way
        let renamed: Vec<(&str, &str)> = rewritten
            .iter()
            .map(|(path, content)| (*path, content.as_str()))
            .collect();
        let (files, diagnostics, store) = run(&renamed, SINGLE_PROJECT, &mut NullParser);

        assert!(diagnostics.is_empty());
        let class = store
            .class_of(Tokid::new(key_of(&files, "a.h"), 8))
            .expect("LIMIT classified");
        assert_eq!(class.len(), 5);
        assert_eq!(class.size(), 2);
        assert!(class.test_attr(Attribute::Macro));
    }

    #[test]
    fn missing_unit_is_reported_and_skipped() {
        let (_, diagnostics, _) = run(
            &[],
            r#"{"projects": [{"name": "p", "units": ["does-not-exist.c"]}]}"#,
            &mut NullParser,
        );

        assert_eq!(diagnostics.error_count(), 1);
    }
}
