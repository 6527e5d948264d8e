use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use burn::data::dataset::{
    vision::{MnistDataset, MnistItem},
    Dataset,
};
use flate2::read::GzDecoder;

use crate::data::DataError;

pub const IMAGE_ROWS: usize = 28;
pub const IMAGE_COLS: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_ROWS * IMAGE_COLS;

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Where the MNIST split comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Download through burn's dataset cache.
    Download,
    /// Read the four IDX files (optionally `.gz`) from a local directory.
    Directory(PathBuf),
}

/// One split of the dataset as stored on disk: raw `u8` pixels and labels.
#[derive(Debug, Clone, Default)]
pub struct RawSplit {
    /// `count * 784` pixels, row-major per image
    pub images: Vec<u8>,
    pub labels: Vec<u8>,
}

impl RawSplit {
    pub fn new(images: Vec<u8>, labels: Vec<u8>) -> Result<Self, DataError> {
        if images.len() % IMAGE_PIXELS != 0 {
            return Err(DataError::PartialImage {
                len: images.len(),
                pixels: IMAGE_PIXELS,
            });
        }
        let image_count = images.len() / IMAGE_PIXELS;
        if image_count != labels.len() {
            return Err(DataError::CountMismatch {
                images: image_count,
                labels: labels.len(),
            });
        }
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Shape of the image array as the dataset stores it: `[N, 28, 28]`
    pub fn shape(&self) -> [usize; 3] {
        [self.len(), IMAGE_ROWS, IMAGE_COLS]
    }
}

/// Loads the fixed `(train, test)` split from the given source.
pub fn load_mnist(source: &DataSource) -> Result<(RawSplit, RawSplit), DataError> {
    match source {
        DataSource::Download => {
            log::info!("Fetching MNIST through the burn dataset cache");
            let train = from_burn_dataset(&MnistDataset::train())?;
            let test = from_burn_dataset(&MnistDataset::test())?;
            Ok((train, test))
        }
        DataSource::Directory(dir) => {
            log::info!("Reading MNIST IDX files from {}", dir.display());
            let train = read_split(dir, TRAIN_IMAGES, TRAIN_LABELS)?;
            let test = read_split(dir, TEST_IMAGES, TEST_LABELS)?;
            Ok((train, test))
        }
    }
}

/// The burn dataset keeps pixels as integral `f32` values in `[0, 255]`.
fn from_burn_dataset(dataset: &MnistDataset) -> Result<RawSplit, DataError> {
    let mut images = Vec::with_capacity(dataset.len() * IMAGE_PIXELS);
    let mut labels = Vec::with_capacity(dataset.len());

    for item in dataset.iter() {
        let MnistItem { image, label, .. } = item;
        images.extend(image.iter().flatten().map(|&p| p.clamp(0.0, 255.0) as u8));
        labels.push(label);
    }

    RawSplit::new(images, labels)
}

fn read_split(dir: &Path, images_name: &str, labels_name: &str) -> Result<RawSplit, DataError> {
    let images = parse_idx_images(&read_idx_file(dir, images_name)?)?;
    let labels = parse_idx_labels(&read_idx_file(dir, labels_name)?)?;
    RawSplit::new(images, labels)
}

/// Reads `name`, falling back to `name.gz`.
fn read_idx_file(dir: &Path, name: &str) -> Result<Vec<u8>, DataError> {
    let plain = dir.join(name);
    let mut buf = Vec::new();
    if plain.exists() {
        File::open(&plain)?.read_to_end(&mut buf)?;
        return Ok(buf);
    }

    let gz = dir.join(format!("{name}.gz"));
    if gz.exists() {
        GzDecoder::new(File::open(&gz)?).read_to_end(&mut buf)?;
        return Ok(buf);
    }

    Err(DataError::MissingFile(plain))
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, DataError> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DataError::Truncated {
            expected: offset + 4,
            actual: bytes.len(),
        })
}

/// Parses an IDX3 image file: 16 byte header followed by the pixel payload.
pub fn parse_idx_images(bytes: &[u8]) -> Result<Vec<u8>, DataError> {
    let magic = read_u32(bytes, 0)?;
    if magic != IMAGES_MAGIC {
        return Err(DataError::BadMagic {
            expected: IMAGES_MAGIC,
            found: magic,
        });
    }

    let count = read_u32(bytes, 4)? as usize;
    let rows = read_u32(bytes, 8)? as usize;
    let cols = read_u32(bytes, 12)? as usize;
    if rows != IMAGE_ROWS || cols != IMAGE_COLS {
        return Err(DataError::BadDimensions { rows, cols });
    }

    let expected = 16 + count * IMAGE_PIXELS;
    if bytes.len() < expected {
        return Err(DataError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    Ok(bytes[16..expected].to_vec())
}

/// Parses an IDX1 label file: 8 byte header followed by one byte per label.
pub fn parse_idx_labels(bytes: &[u8]) -> Result<Vec<u8>, DataError> {
    let magic = read_u32(bytes, 0)?;
    if magic != LABELS_MAGIC {
        return Err(DataError::BadMagic {
            expected: LABELS_MAGIC,
            found: magic,
        });
    }

    let count = read_u32(bytes, 4)? as usize;
    let expected = 8 + count;
    if bytes.len() < expected {
        return Err(DataError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    Ok(bytes[8..expected].to_vec())
}

/// Encodes images in the IDX3 layout. Used to build fixtures and local mirrors.
pub fn encode_idx_images(pixels: &[u8]) -> Vec<u8> {
    let count = (pixels.len() / IMAGE_PIXELS) as u32;
    let mut out = Vec::with_capacity(16 + pixels.len());
    out.extend_from_slice(&IMAGES_MAGIC.to_be_bytes());
    out.extend_from_slice(&count.to_be_bytes());
    out.extend_from_slice(&(IMAGE_ROWS as u32).to_be_bytes());
    out.extend_from_slice(&(IMAGE_COLS as u32).to_be_bytes());
    out.extend_from_slice(pixels);
    out
}

/// Encodes labels in the IDX1 layout.
pub fn encode_idx_labels(labels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + labels.len());
    out.extend_from_slice(&LABELS_MAGIC.to_be_bytes());
    out.extend_from_slice(&(labels.len() as u32).to_be_bytes());
    out.extend_from_slice(labels);
    out
}

/// Writes both splits as uncompressed IDX files into `dir`.
pub fn write_idx_dir(dir: &Path, train: &RawSplit, test: &RawSplit) -> Result<(), DataError> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join(TRAIN_IMAGES), encode_idx_images(&train.images))?;
    std::fs::write(dir.join(TRAIN_LABELS), encode_idx_labels(&train.labels))?;
    std::fs::write(dir.join(TEST_IMAGES), encode_idx_images(&test.images))?;
    std::fs::write(dir.join(TEST_LABELS), encode_idx_labels(&test.labels))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    fn split(count: usize) -> RawSplit {
        let images = (0..count * IMAGE_PIXELS).map(|i| (i % 256) as u8).collect();
        let labels = (0..count).map(|i| (i % 10) as u8).collect();
        RawSplit::new(images, labels).unwrap()
    }

    #[test]
    fn reads_idx_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (train, test) = (split(5), split(3));
        write_idx_dir(dir.path(), &train, &test).unwrap();

        let (loaded_train, loaded_test) =
            load_mnist(&DataSource::Directory(dir.path().to_path_buf())).unwrap();

        assert_eq!(loaded_train.shape(), [5, 28, 28]);
        assert_eq!(loaded_test.shape(), [3, 28, 28]);
        assert_eq!(loaded_train.images, train.images);
        assert_eq!(loaded_test.labels, test.labels);
    }

    #[test]
    fn reads_gzip_files() {
        let dir = tempfile::tempdir().unwrap();
        let (train, test) = (split(2), split(2));
        write_idx_dir(dir.path(), &train, &test).unwrap();

        let raw = std::fs::read(dir.path().join(TRAIN_IMAGES)).unwrap();
        std::fs::remove_file(dir.path().join(TRAIN_IMAGES)).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        std::fs::write(
            dir.path().join(format!("{TRAIN_IMAGES}.gz")),
            encoder.finish().unwrap(),
        )
        .unwrap();

        let (loaded_train, _) =
            load_mnist(&DataSource::Directory(dir.path().to_path_buf())).unwrap();
        assert_eq!(loaded_train.images, train.images);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_mnist(&DataSource::Directory(dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, DataError::MissingFile(_)));
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut bytes = encode_idx_labels(&[1, 2, 3]);
        bytes[3] = 0;
        assert!(matches!(
            parse_idx_labels(&bytes),
            Err(DataError::BadMagic { expected: 2049, .. })
        ));
        assert!(matches!(
            parse_idx_images(&encode_idx_labels(&[1])),
            Err(DataError::BadMagic { expected: 2051, .. })
        ));
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut bytes = encode_idx_images(&vec![0u8; 2 * IMAGE_PIXELS]);
        bytes.truncate(bytes.len() - 10);
        assert!(matches!(
            parse_idx_images(&bytes),
            Err(DataError::Truncated { .. })
        ));
        assert!(matches!(
            parse_idx_labels(&[0, 0]),
            Err(DataError::Truncated { .. })
        ));
    }

    #[test]
    fn rejects_other_image_sizes() {
        let mut bytes = encode_idx_images(&vec![0u8; IMAGE_PIXELS]);
        bytes[11] = 32;
        assert!(matches!(
            parse_idx_images(&bytes),
            Err(DataError::BadDimensions { rows: 32, cols: 28 })
        ));
    }

    #[test]
    fn image_and_label_counts_must_agree() {
        let err = RawSplit::new(vec![0u8; 2 * IMAGE_PIXELS], vec![1]).unwrap_err();
        assert!(matches!(
            err,
            DataError::CountMismatch {
                images: 2,
                labels: 1
            }
        ));
    }
}
