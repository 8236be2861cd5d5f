//! End-to-end alignment of synthetic RGB-D frames with known ground truth.

use dvo_image::pyramid::{build_depth_pyramid, build_intensity_pyramid};
use dvo_image::{Image, ImageSize};
use dvo_lie::SE3;
use dvo_tracking::{
    CostFunction, DefaultReferenceFactory, DirectOptimizer, GaussNewton, LevenbergMarquardt,
    OptimizerParams, PhotometricCost, PinholeIntrinsics, RgbdKeyframe, RobustEstimator,
    RobustKernel, TrackingError,
};
use glam::DVec3;

const WIDTH: usize = 64;
const HEIGHT: usize = 64;
const PLANE_DEPTH: f64 = 1.0;

fn intrinsics() -> PinholeIntrinsics {
    PinholeIntrinsics::new(50.0, 50.0, 32.0, 32.0)
}

/// A shaded intensity ramp: affine plus a bilinear cross term, so that the
/// image is reproduced exactly by bilinear interpolation while every pose
/// direction stays observable.
fn texture(u: f64, v: f64) -> f64 {
    0.3 + 0.004 * u + 0.003 * v + 0.0002 * u * v
}

/// Render the view of the textured plane `z = PLANE_DEPTH` (in the keyframe
/// camera frame) seen from the camera displaced by `pose` (live from
/// keyframe). Each live pixel ray is intersected with the plane and the
/// keyframe texture is sampled analytically.
fn render_plane_view(pose: &SE3) -> Image<f32, 1> {
    let k = intrinsics();
    let inv = pose.inverse();
    let data = (0..HEIGHT)
        .flat_map(|y| {
            (0..WIDTH).map(move |x| {
                let ray = DVec3::new(
                    (x as f64 - k.cx) / k.fx,
                    (y as f64 - k.cy) / k.fy,
                    1.0,
                );
                let rotated = inv.rotation() * ray;
                let lambda = (PLANE_DEPTH - inv.translation().z) / rotated.z;
                let on_plane = inv.transform_point(lambda * ray);
                let (u, v) = k.project(on_plane);
                texture(u, v) as f32
            })
        })
        .collect();
    Image::new(
        ImageSize {
            width: WIDTH,
            height: HEIGHT,
        },
        data,
    )
    .unwrap()
}

fn build_keyframe(num_octaves: usize) -> Result<RgbdKeyframe, TrackingError> {
    let reference = render_plane_view(&SE3::IDENTITY);
    let depth = Image::from_size_val(reference.size(), PLANE_DEPTH as f32);

    let mut keyframe =
        RgbdKeyframe::new(&DefaultReferenceFactory, intrinsics(), num_octaves, 0.5);
    keyframe.set_selection_pixel_percentage(0.9);
    keyframe.update(
        &build_intensity_pyramid(&reference, num_octaves)?,
        &build_depth_pyramid(&depth, num_octaves)?,
    )?;
    Ok(keyframe)
}

fn pose_error(estimate: &SE3, truth: &SE3) -> (f64, f64) {
    let diff = estimate.compose(&truth.inverse());
    (diff.translation().length(), diff.rotation().angle())
}

#[test]
fn test_gauss_newton_recovers_two_pixel_translation() -> Result<(), TrackingError> {
    // a camera translation of 2 * z / fx shifts the image by two pixels
    let truth = SE3::new(dvo_lie::SO3::IDENTITY, DVec3::new(0.04, 0.0, 0.0));
    let live = render_plane_view(&truth);
    let live_pyramid = build_intensity_pyramid(&live, 1)?;

    let keyframe = build_keyframe(1)?;
    let mut cost = PhotometricCost::new(&keyframe, &live_pyramid)?;

    let params = OptimizerParams::new().with_max_iterations(20);
    let mut optimizer =
        GaussNewton::with_params(RobustEstimator::new(RobustKernel::NoWeighting), params);
    let report = optimizer.optimize(&mut cost, 1)?;

    let (t_err, r_err) = pose_error(&cost.model(), &truth);
    assert!(t_err < 1e-3, "translation error {t_err}");
    assert!(r_err < 1e-3, "rotation error {r_err}");
    assert!(
        report.total_iterations() < 20,
        "took {} iterations",
        report.total_iterations()
    );
    assert!(!report.lost_tracking());
    assert!(report.octaves[0].num_pixels > 0);
    Ok(())
}

#[test]
fn test_gauss_newton_recovers_rotation_and_translation() -> Result<(), TrackingError> {
    // 2 degrees about the optical axis plus a lateral translation
    let truth = SE3::from_axis_angle(
        DVec3::Z,
        2.0_f64.to_radians(),
        DVec3::new(0.1, 0.0, 0.0),
    );
    let live = render_plane_view(&truth);
    let num_octaves = 2;
    let live_pyramid = build_intensity_pyramid(&live, num_octaves)?;

    let keyframe = build_keyframe(num_octaves)?;
    let mut cost = PhotometricCost::new(&keyframe, &live_pyramid)?;

    let params = OptimizerParams::new().with_max_iterations(30);
    let mut optimizer =
        GaussNewton::with_params(RobustEstimator::new(RobustKernel::NoWeighting), params);
    let report = optimizer.optimize(&mut cost, num_octaves)?;

    let (t_err, r_err) = pose_error(&cost.model(), &truth);
    assert!(t_err < 1e-3, "translation error {t_err}");
    assert!(r_err < 1e-3, "rotation error {r_err}");
    assert!(!report.lost_tracking());
    Ok(())
}

#[test]
fn test_levenberg_marquardt_recovers_translation() -> Result<(), TrackingError> {
    let truth = SE3::new(dvo_lie::SO3::IDENTITY, DVec3::new(0.04, 0.02, 0.0));
    let live = render_plane_view(&truth);
    let live_pyramid = build_intensity_pyramid(&live, 1)?;

    let keyframe = build_keyframe(1)?;
    let mut cost = PhotometricCost::new(&keyframe, &live_pyramid)?;

    let mut optimizer = LevenbergMarquardt::new(RobustEstimator::new(RobustKernel::NoWeighting));
    let report = optimizer.optimize(&mut cost, 1)?;

    let (t_err, r_err) = pose_error(&cost.model(), &truth);
    assert!(t_err < 1e-3, "translation error {t_err}");
    assert!(r_err < 1e-3, "rotation error {r_err}");
    assert!(!report.lost_tracking());
    Ok(())
}

#[test]
fn test_robust_kernel_with_information_selection() -> Result<(), TrackingError> {
    let truth = SE3::new(dvo_lie::SO3::IDENTITY, DVec3::new(0.04, 0.0, 0.0));
    let live = render_plane_view(&truth);
    let live_pyramid = build_intensity_pyramid(&live, 1)?;

    let reference = render_plane_view(&SE3::IDENTITY);
    let depth = Image::from_size_val(reference.size(), PLANE_DEPTH as f32);
    let mut keyframe = RgbdKeyframe::new(&DefaultReferenceFactory, intrinsics(), 1, 0.5);
    keyframe.set_selection_pixel_percentage(0.5);
    keyframe.set_use_information_selection(true);
    keyframe.update(
        &build_intensity_pyramid(&reference, 1)?,
        &build_depth_pyramid(&depth, 1)?,
    )?;

    let mut cost = PhotometricCost::new(&keyframe, &live_pyramid)?;
    let mut optimizer = GaussNewton::new(RobustEstimator::new(RobustKernel::huber()));
    let report = optimizer.optimize(&mut cost, 1)?;

    let (t_err, r_err) = pose_error(&cost.model(), &truth);
    assert!(t_err < 1e-3, "translation error {t_err}");
    assert!(r_err < 1e-3, "rotation error {r_err}");
    assert!(report.octaves[0].num_pixels > 0);
    Ok(())
}

#[test]
fn test_tracking_lost_when_frames_do_not_overlap() -> Result<(), TrackingError> {
    // a translation far beyond the field of view leaves no visible samples
    let truth = SE3::new(dvo_lie::SO3::IDENTITY, DVec3::new(10.0, 0.0, 0.0));
    let live = render_plane_view(&SE3::IDENTITY);
    let live_pyramid = build_intensity_pyramid(&live, 1)?;

    let keyframe = build_keyframe(1)?;
    let mut cost = PhotometricCost::new(&keyframe, &live_pyramid)?;
    cost.set_model(truth);

    let mut optimizer = GaussNewton::new(RobustEstimator::new(RobustKernel::NoWeighting));
    let report = optimizer.optimize(&mut cost, 1)?;

    assert!(report.lost_tracking());
    assert_eq!(report.octaves[0].num_pixels, 0);
    assert_eq!(report.octaves[0].iterations, 0);
    Ok(())
}
