//! Container sinks.
//!
//! A [`ContainerWriter`] persists one matrix (genes × cells) plus the row,
//! column and global attribute namespaces to a path. The builder never
//! touches the file format directly.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use scopeloom_core::Result;

use crate::attrs::AttrMap;
use crate::keys::LOOM_SPEC_VERSION;
use crate::single_cell::MatrixData;

/// Sink that persists an assembled loom.
pub trait ContainerWriter {
    fn write(
        &self,
        path: &Path,
        matrix: &MatrixData,
        row_attrs: &AttrMap,
        col_attrs: &AttrMap,
        global_attrs: &BTreeMap<String, String>,
    ) -> Result<()>;
}

/// Tuning for the on-disk layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    /// Edge length of the square chunks `/matrix` is stored in.
    pub chunk_size: usize,
    /// gzip level for `/matrix` (0–9).
    pub compression_level: u8,
    /// Value written to the `LOOM_SPEC_VERSION` global attribute.
    pub spec_version: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            compression_level: 2,
            spec_version: LOOM_SPEC_VERSION.to_string(),
        }
    }
}

/// Everything one `write` call received.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenContainer {
    pub path: PathBuf,
    pub matrix: MatrixData,
    pub row_attrs: AttrMap,
    pub col_attrs: AttrMap,
    pub global_attrs: BTreeMap<String, String>,
}

/// Writer that keeps each container in memory instead of on disk.
///
/// Useful for dry runs and for inspecting exactly what would be persisted.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    writes: RefCell<Vec<WrittenContainer>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded writes, oldest first.
    pub fn writes(&self) -> Vec<WrittenContainer> {
        self.writes.borrow().clone()
    }

    /// The most recent write.
    pub fn last(&self) -> Option<WrittenContainer> {
        self.writes.borrow().last().cloned()
    }
}

impl ContainerWriter for MemoryWriter {
    fn write(
        &self,
        path: &Path,
        matrix: &MatrixData,
        row_attrs: &AttrMap,
        col_attrs: &AttrMap,
        global_attrs: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.writes.borrow_mut().push(WrittenContainer {
            path: path.to_path_buf(),
            matrix: matrix.clone(),
            row_attrs: row_attrs.clone(),
            col_attrs: col_attrs.clone(),
            global_attrs: global_attrs.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_writer_records_in_order() {
        let w = MemoryWriter::new();
        let m = MatrixData::Dense(vec![vec![1.0]]);
        let globals = BTreeMap::from([("title".to_string(), "a".to_string())]);
        w.write(Path::new("a.loom"), &m, &AttrMap::new(), &AttrMap::new(), &globals)
            .unwrap();
        w.write(Path::new("b.loom"), &m, &AttrMap::new(), &AttrMap::new(), &BTreeMap::new())
            .unwrap();

        assert_eq!(w.writes().len(), 2);
        let last = w.last().unwrap();
        assert_eq!(last.path, PathBuf::from("b.loom"));
        assert!(last.global_attrs.is_empty());
        assert_eq!(w.writes()[0].global_attrs["title"], "a");
    }

    #[test]
    fn default_config() {
        let c = WriterConfig::default();
        assert_eq!(c.chunk_size, 64);
        assert_eq!(c.spec_version, "2.0.1");
    }
}
