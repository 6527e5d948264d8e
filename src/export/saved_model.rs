use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};

use crate::{
    export::ExportError,
    model::{DigitClassifier, DigitClassifierConfig, ModelSignature},
};

pub const FORMAT_NAME: &str = "digit-trainer/saved-model";
pub const FORMAT_VERSION: u32 = 1;
pub const SERVE_TAG: &str = "serve";

pub(crate) const MANIFEST_FILE: &str = "saved_model.json";
pub(crate) const VARIABLES_DIR: &str = "variables";
/// The recorder appends the `.mpk` extension
pub(crate) const WEIGHTS_STEM: &str = "weights";

pub(crate) type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Describes an export directory: what it serves and how to rebuild the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub format: String,
    pub version: u32,
    pub tags: Vec<String>,
    pub signature: ModelSignature,
    pub model: DigitClassifierConfig,
    /// Weights file relative to the export directory
    pub weights: String,
    pub num_params: usize,
    pub crate_version: String,
}

impl ExportManifest {
    fn is_compatible(&self) -> bool {
        self.format == FORMAT_NAME && self.version == FORMAT_VERSION
    }

    pub fn weights_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.weights)
    }
}

fn incompatible(path: &Path, reason: impl Into<String>) -> ExportError {
    ExportError::Incompatible {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Reads and validates the manifest of an existing export
pub fn read_manifest(dir: &Path) -> Result<ExportManifest, ExportError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Err(ExportError::MissingManifest(dir.to_path_buf()));
    }

    let manifest: ExportManifest = serde_json::from_slice(&fs::read(&path)?)?;
    if !manifest.is_compatible() {
        return Err(incompatible(
            dir,
            format!("format {} v{}", manifest.format, manifest.version),
        ));
    }
    Ok(manifest)
}

/// Makes sure `dir` is absent, empty, or a previous export of the same format.
fn prepare_target(dir: &Path) -> Result<(), ExportError> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
        return Ok(());
    }
    if !dir.is_dir() {
        return Err(incompatible(dir, "not a directory"));
    }

    match read_manifest(dir) {
        Ok(_) => {
            log::warn!("Overwriting previous export in {}", dir.display());
            Ok(())
        }
        Err(ExportError::MissingManifest(_)) => {
            if fs::read_dir(dir)?.next().is_some() {
                Err(incompatible(dir, "directory is not empty"))
            } else {
                Ok(())
            }
        }
        Err(ExportError::Json(e)) => Err(incompatible(dir, format!("unreadable manifest: {e}"))),
        Err(e) => Err(e),
    }
}

/// Writes a self-contained serving export of `model` to `dir`:
/// `saved_model.json` with the named tensor signature and topology, and
/// `variables/weights.mpk` with full-precision parameters.
pub fn export<B: Backend>(
    model: &DigitClassifier<B>,
    config: &DigitClassifierConfig,
    dir: &Path,
) -> Result<ExportManifest, ExportError> {
    prepare_target(dir)?;
    fs::create_dir_all(dir.join(VARIABLES_DIR))?;

    let weights_base = dir.join(VARIABLES_DIR).join(WEIGHTS_STEM);
    WeightsRecorder::new()
        .record(model.clone().into_record(), weights_base)
        .map_err(|e| ExportError::Recorder(format!("{:?}", e)))?;

    let manifest = ExportManifest {
        format: FORMAT_NAME.to_string(),
        version: FORMAT_VERSION,
        tags: vec![SERVE_TAG.to_string()],
        signature: config.signature(),
        model: config.clone(),
        weights: format!("{VARIABLES_DIR}/{WEIGHTS_STEM}.mpk"),
        num_params: model.num_params(),
        crate_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    // Manifest goes last so a partial write never looks like a finished export
    let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
    fs::write(&tmp, serde_json::to_vec_pretty(&manifest)?)?;
    fs::rename(&tmp, dir.join(MANIFEST_FILE))?;

    log::info!("Exported model to {}", dir.display());
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    type TestBackend = NdArray<f32>;

    fn model() -> (DigitClassifier<TestBackend>, DigitClassifierConfig) {
        let config = DigitClassifierConfig::new();
        (config.init(&NdArrayDevice::default()), config)
    }

    #[test]
    fn writes_manifest_and_weights() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("mnist_model");
        let (model, config) = model();

        let manifest = export(&model, &config, &target).unwrap();

        assert!(target.join(MANIFEST_FILE).is_file());
        assert!(manifest.weights_path(&target).is_file());
        assert_eq!(manifest.tags, vec!["serve"]);
        assert_eq!(manifest.signature.input_names(), vec!["inputs"]);
        assert_eq!(manifest.signature.output_names(), vec!["outputs"]);
        assert_eq!(read_manifest(&target).unwrap(), manifest);
    }

    #[test]
    fn overwrites_a_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let (model, config) = model();

        export(&model, &config, dir.path()).unwrap();
        assert!(export(&model, &config, dir.path()).is_ok());
    }

    #[test]
    fn refuses_foreign_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "keep me").unwrap();
        let (model, config) = model();

        let err = export(&model, &config, dir.path()).unwrap_err();
        assert!(matches!(err, ExportError::Incompatible { .. }));
        assert!(dir.path().join("notes.txt").is_file());
    }

    #[test]
    fn refuses_other_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let (model, config) = model();
        let mut manifest = export(&model, &config, dir.path()).unwrap();
        manifest.version = FORMAT_VERSION + 1;
        fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_vec(&manifest).unwrap(),
        )
        .unwrap();

        assert!(matches!(
            export(&model, &config, dir.path()),
            Err(ExportError::Incompatible { .. })
        ));
        assert!(matches!(
            read_manifest(dir.path()),
            Err(ExportError::Incompatible { .. })
        ));
    }

    #[test]
    fn refuses_a_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("model");
        fs::write(&file, b"").unwrap();
        let (model, config) = model();

        assert!(matches!(
            export(&model, &config, &file),
            Err(ExportError::Incompatible { .. })
        ));
    }
}
