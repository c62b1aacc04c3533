//! Per-project output directory layout
//!
//! ```text
//! <root>/<project>/
//!   raw_html/  json/  txt/  pdf/  logs/
//!   metadata.json
//! ```
//!
//! Each output kind has its own directory, so concurrent workers writing
//! different kinds never touch the same file.

use super::OutputFormat;
use std::io;
use std::path::{Path, PathBuf};

/// Paths of one project's output tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    project_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>, project_name: &str) -> Self {
        Self {
            project_dir: root.as_ref().join(project_name),
        }
    }

    /// Creates the project directory and its subdirectories
    ///
    /// The `pdf/` directory is only created when PDF export is enabled.
    pub fn create(&self, pdf: bool) -> io::Result<()> {
        let mut dirs = vec![
            self.dir_for(OutputFormat::RawHtml),
            self.dir_for(OutputFormat::Json),
            self.dir_for(OutputFormat::Txt),
            self.logs_dir(),
        ];
        if pdf {
            dirs.push(self.dir_for(OutputFormat::Pdf));
        }

        for dir in dirs {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Directory holding files of the given format
    pub fn dir_for(&self, format: OutputFormat) -> PathBuf {
        self.project_dir.join(format.as_str())
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.project_dir.join("logs")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.project_dir.join("metadata.json")
    }

    pub fn raw_path(&self, stem: &str) -> PathBuf {
        self.dir_for(OutputFormat::RawHtml).join(format!("{}.html", stem))
    }

    pub fn json_path(&self, stem: &str) -> PathBuf {
        self.dir_for(OutputFormat::Json).join(format!("{}.json", stem))
    }

    /// Path of chunk `sequence_index` (files are numbered from 1)
    pub fn chunk_path(&self, stem: &str, sequence_index: usize) -> PathBuf {
        self.dir_for(OutputFormat::Txt)
            .join(format!("{}_chunk{}.txt", stem, sequence_index + 1))
    }

    pub fn pdf_path(&self, stem: &str) -> PathBuf {
        self.dir_for(OutputFormat::Pdf).join(format!("{}.pdf", stem))
    }
}
