//! Reinitialization crash scenarios
//!
//! - Crash before the first block: prior labels untouched
//! - Crash between the blocks: the prior position 1 stays current
//! - Crash after both blocks: the new layout is complete

use nvlabel::crash_point::points;
use nvlabel::label::{IndexPosition, LabelSize, Seq};
use nvlabel::store::{IndexState, StoreError};

use crate::crash::harness::{execute_with_crash_point, image_args};
use crate::crash::utils::{validate_image, ImageFixture};

fn reinit_v1_2(fixture: &ImageFixture, crash_point: &str) {
    let args = image_args("init", &fixture.image, &["--label-version", "1.2", "--force"]);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let result = execute_with_crash_point(crash_point, &args);
    assert!(result.crashed, "no crash at {}: {}", crash_point, result.stderr);
}

#[test]
fn test_crash_before_first_index_keeps_prior_labels() {
    let fixture = ImageFixture::initialized("1.1");
    let before = fixture.raw();

    reinit_v1_2(&fixture, points::INIT_BEFORE_FIRST_INDEX);

    assert_eq!(fixture.raw(), before);
    let validation = validate_image(&fixture.image).unwrap();
    assert_eq!(validation.geometry.label_size, LabelSize::Small);
    assert_eq!(validation.current, IndexPosition::First);
}

#[test]
fn test_crash_between_index_writes_selects_prior_second() {
    let fixture = ImageFixture::initialized("1.1");

    reinit_v1_2(&fixture, points::INIT_BETWEEN_INDEX_WRITES);

    // position 0 now declares 256-byte labels, position 1 still 128
    let validation = validate_image(&fixture.image).unwrap();
    assert_eq!(validation.geometry.label_size, LabelSize::Small);
    assert_eq!(validation.state, IndexState::Single(IndexPosition::Second));
    assert_eq!(validation.current_block().unwrap().sequence(), Seq::from_raw(2));
    assert_eq!(validation.geometry.nslot, 1020);
}

#[test]
fn test_crash_after_second_index_completes_new_layout() {
    let fixture = ImageFixture::initialized("1.1");

    reinit_v1_2(&fixture, points::INIT_AFTER_SECOND_INDEX);

    let validation = validate_image(&fixture.image).unwrap();
    assert_eq!(validation.geometry.label_size, LabelSize::Large);
    assert_eq!(validation.state, IndexState::Both);
    assert_eq!(validation.current, IndexPosition::First);
}

#[test]
fn test_crash_between_index_writes_on_blank_image() {
    let fixture = ImageFixture::blank();
    let args = image_args("init", &fixture.image, &[]);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let result = execute_with_crash_point(points::INIT_BETWEEN_INDEX_WRITES, &args);
    assert!(result.crashed);

    let validation = validate_image(&fixture.image).unwrap();
    assert_eq!(validation.state, IndexState::Single(IndexPosition::First));
    assert_eq!(validation.current_block().unwrap().sequence(), Seq::from_raw(3));
}

#[test]
fn test_crash_before_first_index_on_blank_image_stays_invalid() {
    let fixture = ImageFixture::blank();
    let args = image_args("init", &fixture.image, &[]);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    assert!(execute_with_crash_point(points::INIT_BEFORE_FIRST_INDEX, &args).crashed);

    assert!(matches!(
        validate_image(&fixture.image).unwrap_err(),
        StoreError::NoValidIndex { .. }
    ));
}
