//! Device-backend integration tests
//!
//! These need a real compute adapter and are ignored by default; run with
//! `cargo test --features gpu -- --ignored`.

#![cfg(feature = "gpu")]

use gridshift_core::Raster;
use gridshift_engine::gpu::{compute_gpu, compute_raw, GpuContext};
use gridshift_engine::prelude::*;

fn four_by_four() -> (Raster<u16>, Raster<u16>, ClassDomain) {
    // Left half class 1, right half class 2; current swaps one column.
    let reference = Raster::from_vec(
        vec![
            1, 1, 2, 2, //
            1, 1, 2, 2, //
            1, 1, 2, 2, //
            1, 1, 2, 2,
        ],
        4,
        4,
    )
    .unwrap();
    let current = Raster::from_vec(
        vec![
            1, 2, 2, 2, //
            1, 2, 2, 2, //
            1, 2, 2, 2, //
            1, 2, 2, 2,
        ],
        4,
        4,
    )
    .unwrap();
    (reference, current, ClassDomain::new([1, 2]).unwrap())
}

#[test]
#[ignore = "requires a compute adapter"]
fn test_gpu_matches_cpu_counts() {
    let (reference, current, domain) = four_by_four();

    let cpu = compute_change_matrix(
        &reference,
        &current,
        &domain,
        None,
        &ChangeMatrixParams::default(),
    )
    .unwrap();

    let ctx = GpuContext::new().unwrap();
    let gpu = compute_change_matrix(
        &reference,
        &current,
        &domain,
        None,
        &ChangeMatrixParams {
            backend: Backend::Gpu(ctx),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(cpu.elements().len(), gpu.elements().len());
    for (c, g) in cpu.elements().iter().zip(gpu.elements()) {
        assert_eq!(
            (c.ref_class, c.cur_class, c.pixel_count),
            (g.ref_class, g.cur_class, g.pixel_count),
            "backends disagree on ({}, {})",
            c.ref_class,
            c.cur_class
        );
    }
    assert!(
        gpu.elements().iter().all(|e| e.area.is_none()),
        "device path carries no area sums"
    );
}

#[test]
#[ignore = "requires a compute adapter"]
fn test_gpu_roi_and_output_image() {
    let (reference, current, domain) = four_by_four();
    let roi = RoiMask::from_fn(4, 4, |row, _| row < 2);

    let ctx = GpuContext::new().unwrap();
    let artifacts = compute_gpu(&ctx, &reference, &current, &domain, Some(&roi)).unwrap();

    // class_count = 3; pair (1, 2) has dense code 1 + 2*3 = 7.
    assert_eq!(artifacts.class_count, 3);
    assert_eq!(artifacts.matrix[1 + 2 * 3], 2, "two (1→2) pixels inside the ROI");

    // Output image carries pair codes inside the ROI and 0 outside.
    assert_eq!(artifacts.output.len(), 16);
    assert_eq!(artifacts.output[1], 7, "(row 0, col 1) is a 1→2 pixel");
    assert_eq!(artifacts.output[12], 0, "row 3 is outside the ROI");
}

#[test]
#[ignore = "requires a compute adapter"]
fn test_gpu_area_weighting_rejected() {
    let (reference, current, domain) = four_by_four();

    let ctx = GpuContext::new().unwrap();
    let err = compute_change_matrix(
        &reference,
        &current,
        &domain,
        None,
        &ChangeMatrixParams {
            backend: Backend::Gpu(ctx),
            area_weighting: true,
            ..Default::default()
        },
    )
    .unwrap_err();

    assert!(matches!(
        err,
        gridshift_core::Error::InvalidParameter { name: "area_weighting", .. }
    ));
}

#[test]
#[ignore = "requires a compute adapter"]
fn test_raw_buffer_validation() {
    let ctx = GpuContext::new().unwrap();

    // Mismatched buffer length.
    assert!(compute_raw(&ctx, &[0, 1], &[0, 1, 1], &[1, 1, 1], 2, 3, 1).is_err());
    // Class code out of range for class_count.
    assert!(compute_raw(&ctx, &[5, 0], &[0, 0], &[1, 1], 2, 2, 1).is_err());
}
