use crate::origin::Tokid;
use crate::source_files::{FileKey, SourceFiles};
use std::collections::VecDeque;

/*
   Origin-tracked character source.

   Streams the bytes of the currently open file; every yielded character
   carries the coordinate of the byte it came from. Two translations
   happen below the lexer: trigraph replacement (when enabled) and
   backslash-newline splicing. Spliced-out bytes never surface, and the
   characters after a splice keep their true file offsets, so token
   origin ranges always point at real source bytes.

   `#include` pushes the current file onto a stack; end of an included
   file pops back transparently.
*/

#[derive(Copy, Clone, Debug)]
pub enum Character {
    At(char, Tokid),
    End(Tokid),
}

impl Character {
    pub fn is(&self, character: char) -> bool {
        matches!(self, Character::At(c, _) if *c == character)
    }

    pub fn is_digit(&self) -> bool {
        matches!(self, Character::At(c, _) if c.is_ascii_digit())
    }

    pub fn is_sign(&self) -> bool {
        matches!(self, Character::At('+' | '-', _))
    }

}

struct Cursor<'a> {
    key: FileKey,
    bytes: &'a [u8],
    pos: usize,
}

pub struct CharReader<'a> {
    files: &'a SourceFiles,
    trigraphs: bool,
    stack: Vec<Cursor<'a>>,
    pending: VecDeque<(char, Tokid)>,
    touched: Vec<FileKey>,
    last_end: Tokid,
}

impl<'a> CharReader<'a> {
    pub fn new(files: &'a SourceFiles, master: FileKey, trigraphs: bool) -> Self {
        let content = files.get(master).content();
        Self {
            files,
            trigraphs,
            stack: vec![Cursor {
                key: master,
                bytes: content.as_bytes(),
                pos: 0,
            }],
            pending: VecDeque::new(),
            touched: vec![master],
            last_end: Tokid::new(master, content.len() as u32),
        }
    }

    /// Open a nested file; subsequent characters come from it until its
    /// end, after which the including file resumes. The caller must have
    /// consumed the include line completely first.
    pub fn push_include(&mut self, key: FileKey) {
        assert!(
            self.pending.is_empty(),
            "lookahead may not cross an include boundary"
        );

        self.touched.push(key);
        self.stack.push(Cursor {
            key,
            bytes: self.files.get(key).content().as_bytes(),
            pos: 0,
        });
    }

    /// The file currently being read.
    pub fn current_file(&self) -> FileKey {
        self.stack
            .last()
            .map(|cursor| cursor.key)
            .unwrap_or(self.last_end.file)
    }

    /// Every file opened through this reader, in open order.
    pub fn touched(&self) -> &[FileKey] {
        &self.touched
    }

    pub fn next(&mut self) -> Character {
        if let Some((c, tokid)) = self.pending.pop_front() {
            return Character::At(c, tokid);
        }

        match self.decode() {
            Some((c, tokid)) => Character::At(c, tokid),
            None => Character::End(self.last_end),
        }
    }

    pub fn peek(&mut self) -> Character {
        self.peek_nth(0)
    }

    pub fn peek_nth(&mut self, index: usize) -> Character {
        while self.pending.len() <= index {
            match self.decode() {
                Some(decoded) => self.pending.push_back(decoded),
                None => return Character::End(self.last_end),
            }
        }

        let (c, tokid) = self.pending[index];
        Character::At(c, tokid)
    }

    fn decode(&mut self) -> Option<(char, Tokid)> {
        loop {
            let trigraphs = self.trigraphs;
            let cursor = self.stack.last_mut()?;

            match raw_at(cursor.bytes, cursor.pos, trigraphs) {
                None => {
                    self.last_end = Tokid::new(cursor.key, cursor.bytes.len() as u32);
                    self.stack.pop();
                }
                Some(('\\', width)) => {
                    if let Some(('\n', newline_width)) =
                        raw_at(cursor.bytes, cursor.pos + width, trigraphs)
                    {
                        // Line splice: drop both, keep reading
                        cursor.pos += width + newline_width;
                        continue;
                    }

                    let tokid = Tokid::new(cursor.key, cursor.pos as u32);
                    cursor.pos += width;
                    return Some(('\\', tokid));
                }
                Some((c, width)) => {
                    let tokid = Tokid::new(cursor.key, cursor.pos as u32);
                    cursor.pos += width;
                    return Some((c, tokid));
                }
            }
        }
    }
}

/// Character starting at `pos`, with the number of source bytes it
/// occupies (3 for a trigraph).
fn raw_at(bytes: &[u8], pos: usize, trigraphs: bool) -> Option<(char, usize)> {
    if pos >= bytes.len() {
        return None;
    }

    if trigraphs && bytes[pos] == b'?' && pos + 2 < bytes.len() && bytes[pos + 1] == b'?' {
        if let Some(translated) = trigraph(bytes[pos + 2]) {
            return Some((translated, 3));
        }
    }

    Some((bytes[pos] as char, 1))
}

fn trigraph(byte: u8) -> Option<char> {
    Some(match byte {
        b'=' => '#',
        b'(' => '[',
        b'/' => '\\',
        b')' => ']',
        b'\'' => '^',
        b'<' => '{',
        b'!' => '|',
        b'>' => '}',
        b'-' => '~',
        _ => return None,
    })
}
