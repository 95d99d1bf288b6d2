//! # Preprocessing Tests
//!
//! Variant construction and the individual image steps on synthetic images.

use image::{DynamicImage, GrayImage, Luma};
use medscan::ocr_config::{PageSegMode, PreprocessingConfig, STRIP_CHAR_WHITELIST};
use medscan::preprocessing::{
    apply_adaptive_threshold, build_ocr_variants, correct_rotation, detect_dominant_angle,
    preprocess_strip, upscale_to_min_side, OcrVariant,
};

fn small_config() -> PreprocessingConfig {
    PreprocessingConfig {
        min_short_side: 64,
        ..Default::default()
    }
}

fn white(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([255])))
}

/// White canvas with one wide horizontal black band
fn horizontal_band() -> GrayImage {
    let mut img = GrayImage::from_pixel(240, 120, Luma([255]));
    for y in 50..70 {
        for x in 20..220 {
            img.put_pixel(x, y, Luma([0]));
        }
    }
    img
}

#[test]
fn test_variant_list_for_blank_image() {
    let variants = build_ocr_variants(&white(60, 30), &small_config());
    let names: Vec<&str> = variants.iter().map(|v| v.name).collect();
    assert_eq!(
        names,
        vec!["strip", "sparse_original", "rotated_90", "rotated_270", "high_contrast"]
    );

    let strip = &variants[0];
    assert_eq!(strip.psm, PageSegMode::SingleBlock);
    assert_eq!(strip.whitelist, Some(STRIP_CHAR_WHITELIST));
    assert_eq!((strip.image.width(), strip.image.height()), (128, 64));

    assert_eq!(variants[1].psm, PageSegMode::SparseText);
    assert_eq!((variants[2].image.width(), variants[2].image.height()), (30, 60));
    assert_eq!(variants[4].psm, PageSegMode::Auto);
}

#[test]
fn test_rotated_variants_need_more_text() {
    let config = small_config();
    let variants = build_ocr_variants(&white(40, 20), &config);
    let rotated = variants
        .iter()
        .find(|v| v.name == "rotated_90")
        .expect("rotated variant present");
    assert_eq!(rotated.min_chars, config.rotated_min_chars);
    assert!(!rotated.accepts("short"));
    assert!(rotated.accepts("BATCH ALA306 EXP DEC 2026"));
}

#[test]
fn test_variant_accepts_any_text_without_minimum() {
    let variant = OcrVariant {
        name: "sparse_original",
        image: white(4, 4),
        psm: PageSegMode::SparseText,
        whitelist: None,
        min_chars: 0,
    };
    assert!(variant.accepts("a"));
    assert!(!variant.accepts("   "));
}

#[test]
fn test_strip_is_binary() {
    let strip = preprocess_strip(&white(50, 40), &small_config()).expect("strip succeeds");
    let gray = strip.to_luma8();
    assert!(gray.pixels().all(|p| p[0] == 0 || p[0] == 255));
}

#[test]
fn test_upscale_only_grows() {
    let grown = upscale_to_min_side(&white(20, 10), 64);
    assert_eq!((grown.width(), grown.height()), (128, 64));
    let kept = upscale_to_min_side(&white(200, 100), 64);
    assert_eq!((kept.width(), kept.height()), (200, 100));
}

#[test]
fn test_adaptive_threshold_keeps_dark_print() {
    let band = DynamicImage::ImageLuma8(horizontal_band());
    let result = apply_adaptive_threshold(&band, 11.0, 10).expect("threshold succeeds");
    let binary = result.image.to_luma8();
    assert_eq!(binary.get_pixel(120, 60)[0], 0);
    assert_eq!(binary.get_pixel(5, 5)[0], 255);
    assert!(apply_adaptive_threshold(&band, 0.0, 10).is_err());
}

#[test]
fn test_horizontal_text_needs_no_rotation() {
    let band = horizontal_band();
    let (angle, lines) = detect_dominant_angle(&band).expect("band edges are lines");
    assert!(angle.abs() < 2.0, "angle was {}", angle);
    assert!(lines >= 1);

    let result = correct_rotation(&DynamicImage::ImageLuma8(band), 5.0, 85.0)
        .expect("rotation check succeeds");
    assert!(result.is_none());
}
