//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the pipeline needs:
//! identify, resize (with encode), and placeholder.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests use the
//! recording [`tests::MockBackend`].

use super::params::{PlaceholderParams, ResizeParams};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Trait for image processing backends.
///
/// `Sync` because the generator shares one backend across the rayon pool.
pub trait ImageBackend: Sync {
    /// Get image dimensions without decoding pixel data where possible.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Resize the source and encode it to `params.output` in `params.format`.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;

    /// Produce the encoded bytes of a small blurred JPEG preview.
    fn placeholder(&self, params: &PlaceholderParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::naming::AssetFormat;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that records operations and writes stub files.
    ///
    /// Outputs get a few bytes of content so existence checks in the
    /// generator behave like they would with real encodes. Uses Mutex (not
    /// RefCell) so it is Sync and works with rayon's par_iter.
    #[derive(Default)]
    pub struct MockBackend {
        /// Dimensions keyed by source file name.
        pub dimensions: Mutex<HashMap<String, Dimensions>>,
        /// (width, format) pairs whose encode fails.
        pub fail_on: Mutex<Vec<(u32, AssetFormat)>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Resize {
            source: String,
            output: String,
            width: u32,
            height: u32,
            format: AssetFormat,
            quality: u32,
        },
        Placeholder {
            source: String,
            width: u32,
            height: u32,
        },
    }

    /// Bytes written for every mock encode.
    pub const STUB_BYTES: &[u8] = b"mock-encoded";

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Register dimensions for source file names.
        pub fn with_sizes(sizes: &[(&str, u32, u32)]) -> Self {
            let backend = Self::default();
            {
                let mut dims = backend.dimensions.lock().unwrap();
                for &(name, width, height) in sizes {
                    dims.insert(name.to_string(), Dimensions { width, height });
                }
            }
            backend
        }

        pub fn fail_on(self, width: u32, format: AssetFormat) -> Self {
            self.fail_on.lock().unwrap().push((width, format));
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn resize_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Resize { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(path.to_string_lossy().to_string()));

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.dimensions
                .lock()
                .unwrap()
                .get(&name)
                .copied()
                .ok_or_else(|| BackendError::ProcessingFailed(format!("cannot decode {name}")))
        }

        fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resize {
                source: params.source.to_string_lossy().to_string(),
                output: params.output.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
                format: params.format,
                quality: params.quality.value(),
            });
            if self
                .fail_on
                .lock()
                .unwrap()
                .contains(&(params.width, params.format))
            {
                return Err(BackendError::ProcessingFailed(format!(
                    "mock encode failure at {}w {}",
                    params.width, params.format
                )));
            }
            std::fs::write(&params.output, STUB_BYTES)?;
            Ok(())
        }

        fn placeholder(&self, params: &PlaceholderParams) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Placeholder {
                source: params.source.to_string_lossy().to_string(),
                width: params.width,
                height: params.height,
            });
            Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
        }
    }

    #[test]
    fn mock_identify_by_file_name() {
        let backend = MockBackend::with_sizes(&[("image.jpg", 800, 600)]);

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.as_tuple(), (800, 600));
        assert!(backend.identify(Path::new("/test/other.jpg")).is_err());

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "/test/image.jpg"));
    }

    #[test]
    fn mock_resize_writes_stub() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();
        let output = tmp.path().join("out.webp");

        backend
            .resize(&ResizeParams {
                source: "/source.jpg".into(),
                output: output.clone(),
                width: 800,
                height: 600,
                format: AssetFormat::Webp,
                quality: super::super::params::Quality::new(80),
            })
            .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), STUB_BYTES);
        assert_eq!(backend.resize_count(), 1);
    }

    #[test]
    fn mock_injected_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new().fail_on(640, AssetFormat::Avif);
        let result = backend.resize(&ResizeParams {
            source: "/source.jpg".into(),
            output: tmp.path().join("x"),
            width: 640,
            height: 480,
            format: AssetFormat::Avif,
            quality: super::super::params::Quality::default(),
        });
        assert!(result.is_err());
        assert!(!tmp.path().join("x").exists());
    }
}
