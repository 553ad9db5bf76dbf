//! The on-disk ensemble model format.
//!
//! A model file is a bincode-encoded header followed by one bincode-encoded
//! tree record per classifier, in training order. The writer is append-only
//! and writes the header exactly once; the reader is rewindable and yields
//! the records in their original order. Encoding is deterministic, so
//! re-emitting a read model reproduces the file byte for byte.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use tamarack_rf::{ClassifierSink, ClassifierStream, ForestError, TreeClassifier, Value};

use crate::error::IoError;

/// Magic bytes identifying a tamarack model file.
const MAGIC: [u8; 4] = *b"TMRK";

/// The model format version this build reads and writes.
const FORMAT_VERSION: u32 = 1;

/// The feature element type stored in a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    /// 32-bit float features.
    F32,
    /// 64-bit float features.
    F64,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::F32 => write!(f, "f32"),
            ElementType::F64 => write!(f, "f64"),
        }
    }
}

/// Ties a feature element type to its on-disk tag.
pub trait Element: Value {
    /// The tag recorded in model files holding this element type.
    const ELEMENT_TYPE: ElementType;
}

impl Element for f32 {
    const ELEMENT_TYPE: ElementType = ElementType::F32;
}

impl Element for f64 {
    const ELEMENT_TYPE: ElementType = ElementType::F64;
}

/// Identity of the program that wrote a model file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerIdentity {
    /// Producer name, e.g. the tool name.
    pub name: String,
    /// Major version of the producer.
    pub major: u32,
    /// Minor version of the producer.
    pub minor: u32,
    /// Patch version of the producer.
    pub patch: u32,
}

/// The once-per-file model header, written right after the magic bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelHeader {
    format_version: u32,
    producer: ProducerIdentity,
    element_type: ElementType,
    class_count: u32,
    feature_count: u32,
}

/// Everything a caller needs to know before choosing how to read a model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// The feature element type stored in the file.
    pub element_type: ElementType,
    /// Number of classes the model distinguishes.
    pub class_count: u32,
    /// Number of features each input row must carry.
    pub feature_count: u32,
    /// Who wrote the file.
    pub producer: ProducerIdentity,
}

/// Read and validate the header of a model file without choosing an
/// element type.
///
/// Use this to dispatch to a typed [`ForestReader`].
#[instrument(fields(path = %path.display()))]
pub fn read_model_info(path: &Path) -> Result<ModelInfo, IoError> {
    let file = File::open(path).map_err(|e| IoError::FileOpen {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader, path)?;
    Ok(ModelInfo {
        element_type: header.element_type,
        class_count: header.class_count,
        feature_count: header.feature_count,
        producer: header.producer,
    })
}

fn read_header(reader: &mut BufReader<File>, path: &Path) -> Result<ModelHeader, IoError> {
    use std::io::Read;

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(|_| IoError::NotAModel {
        path: path.to_path_buf(),
    })?;
    if magic != MAGIC {
        return Err(IoError::NotAModel {
            path: path.to_path_buf(),
        });
    }
    let header: ModelHeader =
        bincode::deserialize_from(&mut *reader).map_err(|e| map_decode_error(e, path))?;
    if header.format_version != FORMAT_VERSION {
        return Err(IoError::UnsupportedModelVersion {
            expected: FORMAT_VERSION,
            found: header.format_version,
            path: path.to_path_buf(),
        });
    }
    Ok(header)
}

fn map_decode_error(error: bincode::Error, path: &Path) -> IoError {
    match *error {
        bincode::ErrorKind::Io(ref io)
            if io.kind() == std::io::ErrorKind::UnexpectedEof =>
        {
            IoError::TruncatedModel {
                path: path.to_path_buf(),
            }
        }
        _ => IoError::Decode {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

// ============================================================================
// Writer
// ============================================================================

/// Append-only sink that writes a model file.
///
/// The header is written on creation; every [`ForestWriter::append`] adds
/// one tree record. Call [`ForestWriter::finish`] to flush.
pub struct ForestWriter<F: Element> {
    writer: BufWriter<File>,
    path: PathBuf,
    class_count: u32,
    feature_count: u32,
    trees_written: usize,
    _marker: PhantomData<F>,
}

impl<F: Element> ForestWriter<F> {
    /// Create a model file and write its header.
    #[instrument(skip(producer), fields(path = %path.display()))]
    pub fn create(
        path: &Path,
        producer: ProducerIdentity,
        class_count: u32,
        feature_count: u32,
    ) -> Result<Self, IoError> {
        let file = File::create(path).map_err(|e| IoError::FileCreate {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut writer = BufWriter::new(file);

        writer.write_all(&MAGIC).map_err(|e| IoError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let header = ModelHeader {
            format_version: FORMAT_VERSION,
            producer,
            element_type: F::ELEMENT_TYPE,
            class_count,
            feature_count,
        };
        bincode::serialize_into(&mut writer, &header).map_err(|e| IoError::Encode {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            class_count,
            feature_count,
            trees_written: 0,
            _marker: PhantomData,
        })
    }

    /// Append one tree record.
    pub fn append(&mut self, tree: &TreeClassifier<F>) -> Result<(), IoError> {
        if tree.class_count() != self.class_count || tree.feature_count() != self.feature_count {
            return Err(IoError::TreeShapeMismatch {
                path: self.path.clone(),
                classes: self.class_count,
                features: self.feature_count,
                got_classes: tree.class_count(),
                got_features: tree.feature_count(),
            });
        }
        bincode::serialize_into(&mut self.writer, tree).map_err(|e| IoError::Encode {
            path: self.path.clone(),
            source: e,
        })?;
        self.trees_written += 1;
        Ok(())
    }

    /// Flush and close the file.
    pub fn finish(mut self) -> Result<(), IoError> {
        self.writer.flush().map_err(|e| IoError::WriteFile {
            path: self.path.clone(),
            source: e,
        })?;
        debug!(path = %self.path.display(), trees = self.trees_written, "model written");
        Ok(())
    }
}

impl<F: Element> ClassifierSink<F> for ForestWriter<F> {
    fn append(&mut self, tree: &TreeClassifier<F>) -> Result<(), ForestError> {
        ForestWriter::append(self, tree).map_err(ForestError::stream)
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Rewindable reader over a model file.
///
/// Yields the tree records in file order; rewinding restarts the stream
/// from the first record. A preload budget keeps up to that many decoded
/// trees resident, so repeated passes only hit the disk for the remainder.
#[derive(Debug)]
pub struct ForestReader<F: Element> {
    file: BufReader<File>,
    path: PathBuf,
    class_count: u32,
    feature_count: u32,
    cache: Vec<Arc<TreeClassifier<F>>>,
    after_cache: u64,
    cursor: usize,
}

impl<F: Element> ForestReader<F> {
    /// Open a model file for streaming without preloading.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        Self::open_with_preload(path, 0)
    }

    /// Open a model file, keeping up to `preload` decoded trees resident.
    #[instrument(fields(path = %path.display(), preload))]
    pub fn open_with_preload(path: &Path, preload: usize) -> Result<Self, IoError> {
        let file = File::open(path).map_err(|e| IoError::FileOpen {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut file = BufReader::new(file);
        let header = read_header(&mut file, path)?;
        if header.element_type != F::ELEMENT_TYPE {
            return Err(IoError::ElementTypeMismatch {
                expected: F::ELEMENT_TYPE,
                found: header.element_type,
                path: path.to_path_buf(),
            });
        }

        let mut reader = Self {
            file,
            path: path.to_path_buf(),
            class_count: header.class_count,
            feature_count: header.feature_count,
            cache: Vec::new(),
            after_cache: 0,
            cursor: 0,
        };
        for _ in 0..preload {
            match reader.decode_record()? {
                Some(tree) => reader.cache.push(tree),
                None => break,
            }
        }
        reader.after_cache = reader.position()?;
        debug!(cached = reader.cache.len(), "model opened");
        Ok(reader)
    }

    /// Number of classes recorded in the header.
    #[must_use]
    pub fn class_count(&self) -> u32 {
        self.class_count
    }

    /// Number of features recorded in the header.
    #[must_use]
    pub fn feature_count(&self) -> u32 {
        self.feature_count
    }

    fn position(&mut self) -> Result<u64, IoError> {
        self.file.stream_position().map_err(|e| IoError::FileOpen {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Decode the next record from the file, or detect a clean end of file.
    fn decode_record(&mut self) -> Result<Option<Arc<TreeClassifier<F>>>, IoError> {
        let at_eof = self
            .file
            .fill_buf()
            .map_err(|e| IoError::FileOpen {
                path: self.path.clone(),
                source: e,
            })?
            .is_empty();
        if at_eof {
            return Ok(None);
        }

        let tree: TreeClassifier<F> = bincode::deserialize_from(&mut self.file)
            .map_err(|e| map_decode_error(e, &self.path))?;
        if tree.class_count() != self.class_count || tree.feature_count() != self.feature_count {
            return Err(IoError::TreeShapeMismatch {
                path: self.path.clone(),
                classes: self.class_count,
                features: self.feature_count,
                got_classes: tree.class_count(),
                got_features: tree.feature_count(),
            });
        }
        tree.validate().map_err(|e| IoError::CorruptTree {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(Some(Arc::new(tree)))
    }

    fn rewind_records(&mut self) -> Result<(), IoError> {
        self.cursor = 0;
        self.file
            .seek(SeekFrom::Start(self.after_cache))
            .map_err(|e| IoError::FileOpen {
                path: self.path.clone(),
                source: e,
            })?;
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Arc<TreeClassifier<F>>>, IoError> {
        let tree = if self.cursor < self.cache.len() {
            Some(Arc::clone(&self.cache[self.cursor]))
        } else {
            self.decode_record()?
        };
        if tree.is_some() {
            self.cursor += 1;
        }
        Ok(tree)
    }
}

impl<F: Element> ClassifierStream<F> for ForestReader<F> {
    fn class_count(&self) -> u32 {
        self.class_count
    }

    fn feature_count(&self) -> u32 {
        self.feature_count
    }

    fn rewind(&mut self) -> Result<(), ForestError> {
        self.rewind_records().map_err(ForestError::stream)
    }

    fn next_classifier(&mut self) -> Result<Option<Arc<TreeClassifier<F>>>, ForestError> {
        self.next_record().map_err(ForestError::stream)
    }
}

#[cfg(test)]
mod tests {
    use super::{ElementType, ForestReader, ForestWriter, ProducerIdentity, read_model_info};
    use crate::error::IoError;
    use std::path::Path;
    use tamarack_rf::{ClassifierStream, TreeClassifier};
    use tempfile::TempDir;

    fn producer() -> ProducerIdentity {
        ProducerIdentity {
            name: "model-tests".into(),
            major: 1,
            minor: 2,
            patch: 3,
        }
    }

    /// A stump over one feature: x < split -> label 0, else label 1.
    fn stump(split: f64) -> TreeClassifier<f64> {
        TreeClassifier::from_columns(
            2,
            1,
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![0, 0, 0],
            vec![split, 0.0, 0.0],
            vec![0, 0, 1],
        )
    }

    fn write_model(path: &Path, splits: &[f64]) {
        let mut writer = ForestWriter::<f64>::create(path, producer(), 2, 1).unwrap();
        for &split in splits {
            writer.append(&stump(split)).unwrap();
        }
        writer.finish().unwrap();
    }

    fn read_all(reader: &mut ForestReader<f64>) -> Vec<f64> {
        let mut splits = Vec::new();
        while let Some(tree) = reader.next_classifier().unwrap() {
            splits.push(tree.split_value(0));
        }
        splits
    }

    #[test]
    fn records_come_back_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        write_model(&path, &[1.0, 2.0, 3.0]);

        let mut reader = ForestReader::<f64>::open(&path).unwrap();
        assert_eq!(reader.class_count(), 2);
        assert_eq!(reader.feature_count(), 1);
        assert_eq!(read_all(&mut reader), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn rewind_restarts_the_stream() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        write_model(&path, &[1.0, 2.0]);

        let mut reader = ForestReader::<f64>::open(&path).unwrap();
        assert_eq!(read_all(&mut reader), vec![1.0, 2.0]);
        assert!(reader.next_classifier().unwrap().is_none());
        reader.rewind().unwrap();
        assert_eq!(read_all(&mut reader), vec![1.0, 2.0]);
    }

    #[test]
    fn preload_serves_the_same_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        write_model(&path, &[1.0, 2.0, 3.0, 4.0]);

        for preload in [0, 2, 4, 10] {
            let mut reader = ForestReader::<f64>::open_with_preload(&path, preload).unwrap();
            assert_eq!(read_all(&mut reader), vec![1.0, 2.0, 3.0, 4.0]);
            reader.rewind().unwrap();
            assert_eq!(read_all(&mut reader), vec![1.0, 2.0, 3.0, 4.0]);
        }
    }

    #[test]
    fn empty_model_streams_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        write_model(&path, &[]);
        let mut reader = ForestReader::<f64>::open(&path).unwrap();
        assert!(reader.next_classifier().unwrap().is_none());
    }

    #[test]
    fn model_info_reports_the_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        write_model(&path, &[1.0]);

        let info = read_model_info(&path).unwrap();
        assert_eq!(info.element_type, ElementType::F64);
        assert_eq!(info.class_count, 2);
        assert_eq!(info.feature_count, 1);
        assert_eq!(info.producer, producer());
    }

    #[test]
    fn element_type_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        write_model(&path, &[1.0]);
        let err = ForestReader::<f32>::open(&path).unwrap_err();
        assert!(matches!(
            err,
            IoError::ElementTypeMismatch {
                expected: ElementType::F32,
                found: ElementType::F64,
                ..
            }
        ));
    }

    #[test]
    fn garbage_is_not_a_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"GARBAGE GARBAGE GARBAGE GARBAGE").unwrap();
        let err = ForestReader::<f64>::open(&path).unwrap_err();
        assert!(matches!(err, IoError::NotAModel { .. }));
    }

    #[test]
    fn truncated_record_is_detected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        write_model(&path, &[1.0]);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let mut reader = ForestReader::<f64>::open(&path).unwrap();
        let err = reader.next_classifier().unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn mismatched_tree_shape_is_rejected_by_the_writer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.bin");
        let mut writer = ForestWriter::<f64>::create(&path, producer(), 3, 4).unwrap();
        let err = writer.append(&stump(1.0)).unwrap_err();
        assert!(matches!(err, IoError::TreeShapeMismatch { .. }));
    }

    #[test]
    fn reemitting_a_model_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("model.bin");
        write_model(&original, &[1.0, 2.0, 3.0]);

        let info = read_model_info(&original).unwrap();
        let mut reader = ForestReader::<f64>::open(&original).unwrap();
        let copy = dir.path().join("copy.bin");
        let mut writer = ForestWriter::<f64>::create(
            &copy,
            info.producer,
            info.class_count,
            info.feature_count,
        )
        .unwrap();
        while let Some(tree) = reader.next_classifier().unwrap() {
            writer.append(&tree).unwrap();
        }
        writer.finish().unwrap();

        assert_eq!(std::fs::read(&original).unwrap(), std::fs::read(&copy).unwrap());
    }
}
