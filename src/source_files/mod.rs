mod file;

pub use file::SourceFile;

use crate::origin::Tokid;
use append_only_vec::AppendOnlyVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};

/*
   The file registry. Paths are interned to dense keys; file records are
   append-only, so shared references into a file's content stay valid
   while new files are registered mid-preprocessing (an #include pulls a
   new file into the registry while the including file is being read).
*/

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileKey {
    index: u32,
}

impl FileKey {
    pub fn from_index(index: u32) -> Self {
        Self { index }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl Display for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file#{}", self.index)
    }
}

pub struct SourceFiles {
    files: AppendOnlyVec<SourceFile>,
    by_path: RefCell<HashMap<PathBuf, FileKey>>,
    readonly_rules: RefCell<Vec<PathBuf>>,
}

impl SourceFiles {
    pub fn new() -> Self {
        Self {
            files: AppendOnlyVec::new(),
            by_path: RefCell::new(HashMap::new()),
            readonly_rules: RefCell::new(Vec::new()),
        }
    }

    /// Files under `prefix` are registered as read-only; must be set up
    /// before the files are first registered.
    pub fn add_readonly_rule(&self, prefix: PathBuf) {
        self.readonly_rules.borrow_mut().push(prefix);
    }

    pub fn get(&self, key: FileKey) -> &SourceFile {
        &self.files[key.index()]
    }

    pub fn lookup(&self, path: &Path) -> Option<FileKey> {
        self.by_path.borrow().get(path).copied()
    }

    /// Register a file with the given content, or return the existing
    /// key when the path was seen before.
    pub fn add(&self, path: PathBuf, content: String) -> FileKey {
        if let Some(existing) = self.lookup(&path) {
            return existing;
        }

        let file = SourceFile::new(path.clone(), content);
        if self
            .readonly_rules
            .borrow()
            .iter()
            .any(|prefix| path.starts_with(prefix))
        {
            file.set_attr(crate::equiv::Attribute::Readonly);
        }

        let index = self.files.push(file);
        let key = FileKey {
            index: index.try_into().expect("file count fits in u32"),
        };
        self.by_path.borrow_mut().insert(path, key);
        key
    }

    /// Register a file from disk unless it is already present.
    pub fn load(&self, path: &Path) -> io::Result<FileKey> {
        if let Some(existing) = self.lookup(path) {
            return Ok(existing);
        }

        let content = std::fs::read_to_string(path)?;
        Ok(self.add(path.to_path_buf(), content))
    }

    /// 1-based line number of an origin coordinate, for diagnostics.
    pub fn line_of(&self, tokid: Tokid) -> usize {
        self.get(tokid.file).line_at(tokid.offset)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileKey, &SourceFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(index, file)| (FileKey { index: index as u32 }, file))
    }
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self::new()
    }
}
