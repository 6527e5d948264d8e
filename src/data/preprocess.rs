use crate::data::{
    loader::{RawSplit, IMAGE_COLS, IMAGE_PIXELS, IMAGE_ROWS},
    DataError,
};

/// Rescales `u8` pixels to `f32` in `[0, 1]`.
/// The flat buffer is interpreted as `[N, 28, 28, 1]`, so it must hold whole images.
pub fn normalize_images(pixels: &[u8]) -> Result<Vec<f32>, DataError> {
    if pixels.len() % IMAGE_PIXELS != 0 {
        return Err(DataError::PartialImage {
            len: pixels.len(),
            pixels: IMAGE_PIXELS,
        });
    }
    Ok(pixels.iter().map(|&p| p as f32 / 255.0).collect())
}

/// Turns class indices into a flat `[N, num_classes]` one-hot matrix.
pub fn one_hot(labels: &[u8], num_classes: usize) -> Result<Vec<f32>, DataError> {
    let mut out = vec![0.0f32; labels.len() * num_classes];
    for (row, &label) in labels.iter().enumerate() {
        let label = label as usize;
        if label >= num_classes {
            return Err(DataError::LabelOutOfRange { label, num_classes });
        }
        out[row * num_classes + label] = 1.0;
    }
    Ok(out)
}

/// A split after preprocessing, kept on the host until batching.
#[derive(Debug, Clone)]
pub struct PreparedSplit {
    /// `[N, 28, 28, 1]`, row-major
    pub images: Vec<f32>,
    /// `[N, num_classes]`
    pub targets: Vec<f32>,
    pub num_classes: usize,
    len: usize,
}

impl PreparedSplit {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn image_shape(&self) -> [usize; 4] {
        [self.len, IMAGE_ROWS, IMAGE_COLS, 1]
    }

    pub fn target_shape(&self) -> [usize; 2] {
        [self.len, self.num_classes]
    }

    pub fn image(&self, index: usize) -> Option<&[f32]> {
        self.images
            .get(index * IMAGE_PIXELS..(index + 1) * IMAGE_PIXELS)
    }

    pub fn target(&self, index: usize) -> Option<&[f32]> {
        self.targets
            .get(index * self.num_classes..(index + 1) * self.num_classes)
    }
}

/// Normalizes images and one-hot encodes labels of a raw split.
pub fn prepare(raw: &RawSplit, num_classes: usize) -> Result<PreparedSplit, DataError> {
    let images = normalize_images(&raw.images)?;
    let targets = one_hot(&raw.labels, num_classes)?;
    let len = raw.len();

    if images.len() / IMAGE_PIXELS != len {
        return Err(DataError::CountMismatch {
            images: images.len() / IMAGE_PIXELS,
            labels: len,
        });
    }

    Ok(PreparedSplit {
        images,
        targets,
        num_classes,
        len,
    })
}
