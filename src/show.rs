use crate::source_files::SourceFiles;

// Rendering anything that needs the file registry to format itself
pub trait Show {
    fn show(&self, w: &mut dyn std::fmt::Write, files: &SourceFiles) -> std::fmt::Result;
}
