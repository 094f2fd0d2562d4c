//! Shared test utilities.
//!
//! Fixture trees are built on the fly inside a `TempDir`; nothing here reads
//! checked-in files.
//!
//! ```rust
//! let tmp = TempDir::new().unwrap();
//! write_file(&tmp.path().join("public/gallery/a-640w.webp"), 2048);
//! write_text(&tmp.path().join("src/page.md"), "![](/gallery/a-640w.webp)");
//! create_test_jpeg(&tmp.path().join("public/gallery/a.jpg"), 64, 48);
//! ```

use std::path::Path;

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
}

/// Write `size` filler bytes, creating parent directories.
pub fn write_file(path: &Path, size: u64) {
    ensure_parent(path);
    std::fs::write(path, vec![0u8; size as usize]).unwrap();
}

/// Write a text file, creating parent directories.
pub fn write_text(path: &Path, text: &str) {
    ensure_parent(path);
    std::fs::write(path, text).unwrap();
}

/// Encode a real gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    ensure_parent(path);
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    img.save_with_format(path, image::ImageFormat::Jpeg).unwrap();
}
