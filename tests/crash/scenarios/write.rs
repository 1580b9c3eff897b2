//! Zero-fill and raw write crash scenarios
//!
//! - Crash before the write: image unchanged
//! - Crash after the write: data durable before the refresh step

use std::fs;

use nvlabel::crash_point::points;

use crate::crash::harness::{execute_with_crash_point, image_args};
use crate::crash::utils::{validate_image, ImageFixture};

fn crash_run(crash_point: &str, args: Vec<String>) {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let result = execute_with_crash_point(crash_point, &args);
    assert!(result.crashed, "no crash at {}: {}", crash_point, result.stderr);
}

#[test]
fn test_crash_before_zero_leaves_image_unchanged() {
    let fixture = ImageFixture::initialized("1.1");
    let before = fixture.raw();

    crash_run(points::ZERO_BEFORE_WRITE, image_args("zero", &fixture.image, &[]));

    assert_eq!(fixture.raw(), before);
    assert!(validate_image(&fixture.image).is_ok());
}

#[test]
fn test_crash_after_zero_has_zeroed_image() {
    let fixture = ImageFixture::initialized("1.2");

    crash_run(points::ZERO_AFTER_WRITE, image_args("zero", &fixture.image, &[]));

    assert!(fixture.raw().iter().all(|b| *b == 0));
    assert!(validate_image(&fixture.image).is_err());
}

#[test]
fn test_crash_before_raw_write_submit_leaves_image_unchanged() {
    let fixture = ImageFixture::initialized("1.1");
    let before = fixture.raw();
    let input = fixture.image.with_extension("in");
    fs::write(&input, [0xFFu8; 512]).unwrap();
    let input = input.display().to_string();

    crash_run(
        points::WRITE_BEFORE_SUBMIT,
        image_args("write", &fixture.image, &["--input", &input, "--offset", "0"]),
    );

    assert_eq!(fixture.raw(), before);
    assert!(validate_image(&fixture.image).is_ok());
}
