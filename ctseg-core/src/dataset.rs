//! Dataset naming convention and layout validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Numeric dataset identifier, e.g. `1` for `Dataset001_CT_Scans`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatasetId(pub u32);

impl DatasetId {
    /// Directory name for this dataset: `Dataset{id:03}_{suffix}`.
    pub fn name(&self, suffix: &str) -> String {
        format!("Dataset{:03}_{}", self.0, suffix)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for DatasetId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Names of the entries a dataset directory must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetLayout {
    pub name_suffix: String,
    pub images_dir: String,
    pub labels_dir: String,
    pub descriptor_file: String,
    pub image_extension: String,
}

impl Default for DatasetLayout {
    fn default() -> Self {
        crate::config::DatasetConfig::default().layout()
    }
}

impl DatasetLayout {
    pub fn dataset_name(&self, id: DatasetId) -> String {
        id.name(&self.name_suffix)
    }
}

/// A required entry found missing during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingItem {
    DatasetDir,
    ImagesDir(String),
    LabelsDir(String),
    Descriptor(String),
}

impl fmt::Display for MissingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DatasetDir => f.write_str("dataset directory"),
            Self::ImagesDir(name) | Self::LabelsDir(name) | Self::Descriptor(name) => {
                f.write_str(name)
            }
        }
    }
}

/// Result of validating one dataset directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetReport {
    pub dataset_name: String,
    pub root: PathBuf,
    pub missing: Vec<MissingItem>,
    /// Only counted when nothing is missing.
    pub image_count: usize,
    pub label_count: usize,
}

impl DatasetReport {
    /// Whether the dataset can be handed to the framework.
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }

    /// Image/label count mismatch. Reported as a warning only.
    pub fn count_mismatch(&self) -> bool {
        self.is_ready() && self.image_count != self.label_count
    }
}

/// Validate the layout of dataset `id` under `raw_root`.
///
/// Every missing entry is collected before reporting. A count mismatch between
/// images and labels is logged as a warning and does not fail validation.
pub fn check_dataset(id: DatasetId, raw_root: &Path, layout: &DatasetLayout) -> DatasetReport {
    let dataset_name = layout.dataset_name(id);
    let root = raw_root.join(&dataset_name);

    info!("Checking dataset: {}", dataset_name);
    info!("Location: {}", root.display());

    let mut report = DatasetReport {
        dataset_name,
        root,
        missing: Vec::new(),
        image_count: 0,
        label_count: 0,
    };

    if !report.root.exists() {
        error!("Dataset not found at {}", report.root.display());
        report.missing.push(MissingItem::DatasetDir);
        return report;
    }

    let images = report.root.join(&layout.images_dir);
    let labels = report.root.join(&layout.labels_dir);

    if !images.exists() {
        report
            .missing
            .push(MissingItem::ImagesDir(layout.images_dir.clone()));
    }
    if !labels.exists() {
        report
            .missing
            .push(MissingItem::LabelsDir(layout.labels_dir.clone()));
    }
    if !report.root.join(&layout.descriptor_file).exists() {
        report
            .missing
            .push(MissingItem::Descriptor(layout.descriptor_file.clone()));
    }

    if !report.missing.is_empty() {
        let names: Vec<String> = report.missing.iter().map(ToString::to_string).collect();
        error!("Missing required files/folders: {}", names.join(", "));
        return report;
    }

    report.image_count = count_with_extension(&images, &layout.image_extension);
    report.label_count = count_with_extension(&labels, &layout.image_extension);

    info!(
        "Dataset found. Images: {}, Labels: {}",
        report.image_count, report.label_count
    );
    if report.count_mismatch() {
        warn!(
            "Number of images ({}) != number of labels ({})",
            report.image_count, report.label_count
        );
    }

    report
}

/// Count entries directly inside `dir` whose names end with `extension`.
fn count_with_extension(dir: &Path, extension: &str) -> usize {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(extension))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a plain-text subscriber and return everything it logged.
    fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || SharedBuf(sink.clone()))
            .finish();
        let value = tracing::subscriber::with_default(subscriber, f);
        let logs = String::from_utf8_lossy(&buf.lock().unwrap()).into_owned();
        (value, logs)
    }

    fn scaffold(raw: &Path, id: u32, images: usize, labels: usize) -> PathBuf {
        let root = raw.join(DatasetId(id).name("CT_Scans"));
        std::fs::create_dir_all(root.join("imagesTr")).unwrap();
        std::fs::create_dir_all(root.join("labelsTr")).unwrap();
        std::fs::write(root.join("dataset.json"), "{}").unwrap();
        for i in 0..images {
            std::fs::write(root.join("imagesTr").join(format!("case_{i:03}_0000.nii.gz")), b"").unwrap();
        }
        for i in 0..labels {
            std::fs::write(root.join("labelsTr").join(format!("case_{i:03}.nii.gz")), b"").unwrap();
        }
        root
    }

    #[test]
    fn test_dataset_name_template() {
        assert_eq!(DatasetId(1).name("CT_Scans"), "Dataset001_CT_Scans");
        assert_eq!(DatasetId(42).name("CT_Scans"), "Dataset042_CT_Scans");
        assert_eq!(DatasetId(1234).name("CT_Scans"), "Dataset1234_CT_Scans");
    }

    #[test]
    fn test_missing_dataset_dir() {
        let raw = TempDir::new().unwrap();
        let report = check_dataset(DatasetId(7), raw.path(), &DatasetLayout::default());
        assert!(!report.is_ready());
        assert_eq!(report.missing, vec![MissingItem::DatasetDir]);
    }

    #[test]
    fn test_missing_labels_only() {
        let raw = TempDir::new().unwrap();
        let root = scaffold(raw.path(), 1, 2, 2);
        std::fs::remove_dir_all(root.join("labelsTr")).unwrap();

        let report = check_dataset(DatasetId(1), raw.path(), &DatasetLayout::default());
        assert!(!report.is_ready());
        assert_eq!(report.missing, vec![MissingItem::LabelsDir("labelsTr".into())]);
    }

    #[test]
    fn test_missing_items_accumulate() {
        let raw = TempDir::new().unwrap();
        let root = raw.path().join("Dataset003_CT_Scans");
        std::fs::create_dir_all(&root).unwrap();

        let report = check_dataset(DatasetId(3), raw.path(), &DatasetLayout::default());
        assert_eq!(
            report.missing,
            vec![
                MissingItem::ImagesDir("imagesTr".into()),
                MissingItem::LabelsDir("labelsTr".into()),
                MissingItem::Descriptor("dataset.json".into()),
            ]
        );
    }

    #[test]
    fn test_count_mismatch_is_not_failure() {
        let raw = TempDir::new().unwrap();
        scaffold(raw.path(), 2, 10, 9);

        let (report, logs) =
            capture_logs(|| check_dataset(DatasetId(2), raw.path(), &DatasetLayout::default()));
        assert!(report.is_ready());
        assert!(report.count_mismatch());
        assert_eq!(report.image_count, 10);
        assert_eq!(report.label_count, 9);

        let warning = logs
            .lines()
            .find(|line| line.contains("Number of images (10) != number of labels (9)"))
            .expect("mismatch warning logged");
        assert!(warning.contains("WARN"));
    }

    #[test]
    fn test_matching_counts_log_no_warning() {
        let raw = TempDir::new().unwrap();
        scaffold(raw.path(), 5, 3, 3);

        let (report, logs) =
            capture_logs(|| check_dataset(DatasetId(5), raw.path(), &DatasetLayout::default()));
        assert!(report.is_ready());
        assert!(logs.contains("Dataset found. Images: 3, Labels: 3"));
        assert!(!logs.contains("WARN"));
    }

    #[test]
    fn test_empty_dataset_is_ready() {
        let raw = TempDir::new().unwrap();
        scaffold(raw.path(), 4, 0, 0);

        let report = check_dataset(DatasetId(4), raw.path(), &DatasetLayout::default());
        assert!(report.is_ready());
        assert!(!report.count_mismatch());
    }

    #[test]
    fn test_only_matching_extension_counted() {
        let raw = TempDir::new().unwrap();
        let root = scaffold(raw.path(), 5, 3, 3);
        std::fs::write(root.join("imagesTr").join("notes.txt"), b"").unwrap();
        std::fs::write(root.join("imagesTr").join("scan.nii"), b"").unwrap();

        let report = check_dataset(DatasetId(5), raw.path(), &DatasetLayout::default());
        assert_eq!(report.image_count, 3);
    }
}
