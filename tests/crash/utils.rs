//! Crash testing utilities
//!
//! Image setup and post-crash inspection through the library API.

use std::fs;
use std::path::{Path, PathBuf};

use nvlabel::device::FileDimm;
use nvlabel::store::{LabelStore, StoreResult, Validation};
use tempfile::TempDir;

use super::harness::{execute_ok, image_args};

pub const IMAGE_SIZE: u32 = 131072;

/// A scratch directory holding one label area image.
pub struct ImageFixture {
    _dir: TempDir,
    pub image: PathBuf,
}

impl ImageFixture {
    /// Creates a zero-filled image through the CLI.
    pub fn blank() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let image = dir.path().join("nmem0.img");
        let size = IMAGE_SIZE.to_string();
        run_cli(&image_args("create-image", &image, &["--size", &size]));
        Self { _dir: dir, image }
    }

    /// Creates an image and initializes it with `version`.
    pub fn initialized(version: &str) -> Self {
        let fixture = Self::blank();
        run_cli(&image_args("init", &fixture.image, &["--label-version", version]));
        fixture
    }

    pub fn raw(&self) -> Vec<u8> {
        fs::read(&self.image).expect("Failed to read image")
    }
}

pub fn run_cli(args: &[String]) {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    execute_ok(&args);
}

/// Validates the image in-process.
pub fn validate_image(image: &Path) -> StoreResult<Validation> {
    let dimm = FileDimm::open(image, 4096).expect("Failed to open image");
    LabelStore::open(dimm)?.validate()
}
