use crate::equiv::{AttrSet, Attribute};
use std::cell::Cell;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    content: String,
    line_starts: Vec<u32>,
    attrs: Cell<AttrSet>,
    identifier_occurrences: Cell<u32>,
}

impl SourceFile {
    pub fn new(path: PathBuf, content: String) -> Self {
        let mut line_starts = vec![0];
        for (offset, byte) in content.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset as u32 + 1);
            }
        }

        Self {
            path,
            content,
            line_starts,
            attrs: Cell::new(AttrSet::new()),
            identifier_occurrences: Cell::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filename(&self) -> &str {
        self.path.to_str().unwrap_or("<invalid unicode filename>")
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// 1-based line number containing `offset`.
    pub fn line_at(&self, offset: u32) -> usize {
        self.line_starts.partition_point(|start| *start <= offset)
    }

    pub fn attrs(&self) -> AttrSet {
        self.attrs.get()
    }

    pub fn set_attr(&self, attribute: Attribute) {
        self.attrs.set(self.attrs.get().with(attribute));
    }

    pub fn has_attr(&self, attribute: Attribute) -> bool {
        self.attrs.get().test(attribute)
    }

    pub fn is_readonly(&self) -> bool {
        self.has_attr(Attribute::Readonly)
    }

    // Metrics
    pub fn bytes(&self) -> usize {
        self.content.len()
    }

    pub fn lines(&self) -> usize {
        if self.content.is_empty() {
            0
        } else if self.content.ends_with('\n') {
            self.line_starts.len() - 1
        } else {
            self.line_starts.len()
        }
    }

    pub fn record_identifier(&self) {
        self.identifier_occurrences
            .set(self.identifier_occurrences.get() + 1);
    }

    pub fn identifier_occurrences(&self) -> u32 {
        self.identifier_occurrences.get()
    }
}
