//! Payloads and the collaborators that produce and persist them.
//!
//! The codec pipeline only ever sees a [`Payload`]. Getting one from disk, or
//! synthesising one, and writing the reconstructions back out is the job of a
//! [`PayloadSource`] and a [`PayloadSink`]. Files the `image` crate can decode
//! become grayscale or RGB payloads that keep their dimensions, and image
//! payloads are written back as PNG. Anything else, including files that only
//! look like an image, is carried as a raw byte stream.

use crate::cs::ecc::Result;
use crate::error::Error;
use image::{DynamicImage, GrayImage, RgbImage};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Largest raster accepted, matching the `image` crate's default allocation limit
pub const MAX_IMAGE_BYTES: usize = 512 * 1024 * 1024;

/// Raster shape of an image payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    width: u32,
    height: u32,
    /// 1 for grayscale, 3 for RGB
    channels: usize,
    byte_len: usize,
}

impl Dimensions {
    /// Creates a raster shape.
    ///
    /// # Arguments
    ///
    /// * `width`, `height` - Size in pixels, both positive and within `u32`
    /// * `channels` - 1 for grayscale or 3 for RGB
    ///
    /// # Returns
    ///
    /// The shape, or `InvalidInput` if it is empty, has an unsupported channel
    /// count, or needs more than [`MAX_IMAGE_BYTES`] bytes.
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::invalid_input(format!(
                "image dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if channels != 1 && channels != 3 {
            return Err(Error::invalid_input(format!(
                "unsupported channel count {}",
                channels
            )));
        }

        let too_large = || {
            Error::invalid_input(format!(
                "{}x{}x{} image exceeds {} bytes",
                width, height, channels, MAX_IMAGE_BYTES
            ))
        };
        let byte_len = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .filter(|&n| n <= MAX_IMAGE_BYTES)
            .ok_or_else(too_large)?;
        let width = u32::try_from(width).map_err(|_| too_large())?;
        let height = u32::try_from(height).map_err(|_| too_large())?;

        Ok(Self {
            width,
            height,
            channels,
            byte_len,
        })
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn height(&self) -> usize {
        self.height as usize
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of bytes a payload of this shape holds
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }
}

/// An ordered byte stream, plus the shape needed to rebuild an image from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    bytes: Vec<u8>,
    dimensions: Option<Dimensions>,
}

impl Payload {
    /// A raw byte stream with no shape
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            dimensions: None,
        }
    }

    /// An image payload. The byte count must match the dimensions exactly.
    pub fn with_dimensions(bytes: Vec<u8>, dimensions: Dimensions) -> Result<Self> {
        if bytes.len() != dimensions.byte_len() {
            return Err(Error::invalid_input(format!(
                "{}x{}x{} image needs {} bytes, got {}",
                dimensions.width,
                dimensions.height,
                dimensions.channels,
                dimensions.byte_len(),
                bytes.len()
            )));
        }
        Ok(Self {
            bytes,
            dimensions: Some(dimensions),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// A payload with the same shape carrying different bytes of equal length.
    pub(crate) fn reshaped(&self, bytes: Vec<u8>) -> Self {
        debug_assert_eq!(bytes.len(), self.bytes.len());
        Self {
            bytes,
            dimensions: self.dimensions,
        }
    }

    /// Interprets file contents. Decodable images keep their shape, with any
    /// alpha channel dropped; everything else is a raw payload.
    pub fn from_file_bytes(data: Vec<u8>) -> Self {
        match decode_image(&data) {
            Some(payload) => payload,
            None => Self::new(data),
        }
    }
}

fn decode_image(data: &[u8]) -> Option<Payload> {
    let format = image::guess_format(data).ok()?;
    let decoded = match image::load_from_memory_with_format(data, format) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("not decodable as {:?} ({}), treating as raw bytes", format, e);
            return None;
        }
    };

    let (channels, bytes) = if decoded.color().has_color() {
        (3, decoded.to_rgb8().into_raw())
    } else {
        (1, decoded.to_luma8().into_raw())
    };
    let (width, height) = (decoded.width() as usize, decoded.height() as usize);
    let dims = Dimensions::new(width, height, channels).ok()?;
    Payload::with_dimensions(bytes, dims).ok()
}

fn encode_image(bytes: &[u8], dims: Dimensions) -> Result<DynamicImage> {
    let raster = bytes.to_vec();
    let image = if dims.channels == 1 {
        GrayImage::from_raw(dims.width, dims.height, raster).map(DynamicImage::ImageLuma8)
    } else {
        RgbImage::from_raw(dims.width, dims.height, raster).map(DynamicImage::ImageRgb8)
    };
    image.ok_or_else(|| {
        Error::MalformedPayload(format!(
            "{} bytes do not fill a {}x{} raster",
            bytes.len(),
            dims.width,
            dims.height
        ))
    })
}

/// Supplies the payload to transmit.
pub trait PayloadSource {
    fn load(&mut self) -> Result<Payload>;
}

/// Accepts reconstructed payloads.
pub trait PayloadSink {
    /// Persists `payload` under `name`, returning where it went.
    fn store(&mut self, name: &str, payload: &Payload) -> Result<PathBuf>;
}

/// Reads a payload from a file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PayloadSource for FileSource {
    fn load(&mut self) -> Result<Payload> {
        if !self.path.exists() {
            return Err(Error::PayloadNotFound(self.path.clone()));
        }
        let payload = Payload::from_file_bytes(fs::read(&self.path)?);
        debug!(
            "loaded {} bytes from {} ({:?})",
            payload.len(),
            self.path.display(),
            payload.dimensions()
        );
        Ok(payload)
    }
}

/// Generates a synthetic RGB gradient image when no real input is available.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderSource {
    width: usize,
    height: usize,
}

impl PlaceholderSource {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

impl PayloadSource for PlaceholderSource {
    fn load(&mut self) -> Result<Payload> {
        let dims = Dimensions::new(self.width, self.height, 3)?;
        let scale = |i: usize, n: usize| (i * 255 / n.saturating_sub(1).max(1)) as u8;

        let mut bytes = Vec::with_capacity(dims.byte_len());
        for y in 0..dims.height() {
            for x in 0..dims.width() {
                let red = scale(x, dims.width());
                let green = scale(y, dims.height());
                let blue = 255 - red / 2 - green / 2;
                bytes.extend_from_slice(&[red, green, blue]);
            }
        }

        debug!("generated {}x{} placeholder image", dims.width, dims.height);
        Payload::with_dimensions(bytes, dims)
    }
}

/// Writes payloads into a directory, one file per name.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PayloadSink for FileSink {
    fn store(&mut self, name: &str, payload: &Payload) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = match payload.dimensions() {
            Some(dims) => {
                let path = self.dir.join(format!("{}.png", name));
                encode_image(payload.bytes(), dims)?.save(&path)?;
                path
            }
            None => {
                let path = self.dir.join(format!("{}.bin", name));
                fs::write(&path, payload.bytes())?;
                path
            }
        };
        debug!("wrote {} bytes to {}", payload.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_dimension_validation() {
        assert!(Dimensions::new(0, 4, 3).is_err());
        assert!(Dimensions::new(4, 4, 2).is_err());
        let dims = Dimensions::new(4, 2, 3).unwrap();
        assert_eq!(dims.byte_len(), 24);
        assert_eq!((dims.width(), dims.height(), dims.channels()), (4, 2, 3));

        assert!(Payload::with_dimensions(vec![0; 23], dims).is_err());
        assert!(Payload::with_dimensions(vec![0; 24], dims).is_ok());
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        // Products that overflow usize, exceed the raster limit or u32
        assert!(matches!(
            Dimensions::new(usize::MAX, usize::MAX, 3),
            Err(Error::InvalidInput(_))
        ));
        let beyond_u32 = u32::MAX as usize + 1;
        assert!(matches!(
            Dimensions::new(beyond_u32, beyond_u32, 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(Dimensions::new(100_000, 100_000, 3).is_err());
        assert!(Dimensions::new(MAX_IMAGE_BYTES, 1, 1).is_ok());
        assert!(Dimensions::new(MAX_IMAGE_BYTES + 1, 1, 1).is_err());
        assert!(PlaceholderSource::new(usize::MAX, 2).load().is_err());
    }

    #[test]
    fn test_hostile_image_header_is_raw() {
        let data = b"P5\n4294967296 4294967296 255\n\x00".to_vec();
        let payload = Payload::from_file_bytes(data.clone());
        assert_eq!(payload.dimensions(), None);
        assert_eq!(payload.bytes(), data.as_slice());
    }

    #[test]
    fn test_lookalike_header_is_raw() {
        for data in [
            b"P6 is just how this text starts".to_vec(),
            b"P6\n2 2\n255\n\x01\x02".to_vec(),
            b"P5\n1 1\n255".to_vec(),
        ] {
            let payload = Payload::from_file_bytes(data.clone());
            assert_eq!(payload.dimensions(), None);
            assert_eq!(payload.bytes(), data.as_slice());
        }
    }

    #[test]
    fn test_pnm_input_keeps_shape() {
        let mut data = b"P6\n# made by hand\n1 1\n255\n".to_vec();
        data.extend_from_slice(&[1, 2, 3]);
        let payload = Payload::from_file_bytes(data);
        assert_eq!(payload.bytes(), &[1, 2, 3]);
        assert_eq!(payload.dimensions(), Some(Dimensions::new(1, 1, 3).unwrap()));

        let mut gray = b"P5\n3 2\n255\n".to_vec();
        gray.extend_from_slice(&[0, 10, 20, 30, 40, 50]);
        let payload = Payload::from_file_bytes(gray);
        assert_eq!(payload.bytes(), &[0, 10, 20, 30, 40, 50]);
        assert_eq!(payload.dimensions(), Some(Dimensions::new(3, 2, 1).unwrap()));
    }

    #[test]
    fn test_raw_bytes_pass_through() {
        let payload = Payload::from_file_bytes(b"hello".to_vec());
        assert_eq!(payload.bytes(), b"hello");
        assert_eq!(payload.dimensions(), None);
    }

    #[test]
    fn test_placeholder_gradient() {
        let payload = PlaceholderSource::new(8, 4).load().unwrap();
        let dims = payload.dimensions().unwrap();
        assert_eq!((dims.width(), dims.height(), dims.channels()), (8, 4, 3));
        assert_eq!(payload.len(), 96);
        // Top-left is dark red/green, bottom-right saturates both
        assert_eq!(&payload.bytes()[..2], &[0, 0]);
        assert_eq!(&payload.bytes()[93..95], &[255, 255]);

        assert!(PlaceholderSource::new(0, 4).load().is_err());
        assert!(PlaceholderSource::new(1, 1).load().is_ok());
    }

    #[test]
    fn test_missing_file_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nothing.png");
        assert!(matches!(
            FileSource::new(&path).load(),
            Err(Error::PayloadNotFound(p)) if p == path
        ));
    }

    #[test]
    fn test_sink_and_source_roundtrip() {
        let dir = tempdir().unwrap();
        let mut sink = FileSink::new(dir.path().join("out"));

        let image = PlaceholderSource::new(5, 3).load().unwrap();
        let image_path = sink.store("original", &image).unwrap();
        assert_eq!(image_path, dir.path().join("out").join("original.png"));
        assert_eq!(FileSource::new(&image_path).load().unwrap(), image);

        let gray = Payload::with_dimensions(vec![7; 12], Dimensions::new(4, 3, 1).unwrap()).unwrap();
        let gray_path = sink.store("gray", &gray).unwrap();
        assert_eq!(FileSource::new(&gray_path).load().unwrap(), gray);

        let raw = Payload::new(vec![9, 8, 7]);
        let raw_path = sink.store("raw", &raw).unwrap();
        assert_eq!(raw_path, dir.path().join("out").join("raw.bin"));
        assert_eq!(FileSource::new(&raw_path).load().unwrap(), raw);
    }
}
