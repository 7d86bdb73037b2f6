// Writes the artifacts as CSV files under an output directory.

use std::path::{Path, PathBuf};

use vote_structure::{Artifact, ArtifactWriter};

use crate::study::*;

/// `<root>/<segments...>/<name>.csv`. Directories are created when the first
/// artifact that needs them is written.
#[derive(Debug)]
pub struct CsvDirectoryWriter {
    root: PathBuf,
    pub written: Vec<PathBuf>,
}

impl CsvDirectoryWriter {
    pub fn new(root: &Path) -> CsvDirectoryWriter {
        CsvDirectoryWriter {
            root: root.to_path_buf(),
            written: Vec::new(),
        }
    }

    pub fn path_of(&self, artifact: &Artifact) -> PathBuf {
        let mut p = self.root.clone();
        for s in artifact.key.segments.iter() {
            p.push(s);
        }
        p.push(format!("{}.csv", artifact.key.name));
        p
    }
}

impl ArtifactWriter for CsvDirectoryWriter {
    type Error = StudyError;

    fn write(&mut self, artifact: &Artifact) -> StudyResult<()> {
        let name = artifact.key.qualified_name();
        let path = self.path_of(artifact);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context(WritingArtifactSnafu { name: name.clone() })?;
        }
        let mut wtr = csv::Writer::from_path(&path).context(WritingCsvSnafu { name: name.clone() })?;
        wtr.write_record(&artifact.table.header)
            .context(WritingCsvSnafu { name: name.clone() })?;
        for row in artifact.table.rows.iter() {
            wtr.write_record(row)
                .context(WritingCsvSnafu { name: name.clone() })?;
        }
        wtr.flush().context(WritingArtifactSnafu { name })?;
        debug!("write: {:?}", path);
        self.written.push(path);
        Ok(())
    }
}
