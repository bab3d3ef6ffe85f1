use crate::error::Result;
use crate::pipeline::types::{HandObservation, HandSide};
use opencv::core::{self, Mat, Point, Scalar, Size, Vector, CV_8UC1};
use opencv::imgproc::{self, polylines, LINE_8};
use opencv::prelude::*;

/// Outline masks for both hands of one frame.
pub struct HandMasks {
    pub left: Mat,
    pub right: Mat,
}

/// Draws each hand's keypoints as a closed 1px polyline on a blank canvas the
/// size of the frame, one canvas per side, then upscales both canvases with
/// nearest-neighbor interpolation.
pub fn rasterize_hands(
    hands: &[HandObservation],
    width: i32,
    height: i32,
    upscale: f64,
) -> Result<HandMasks> {
    let mut left = Mat::zeros(height, width, CV_8UC1)?.to_mat()?;
    let mut right = Mat::zeros(height, width, CV_8UC1)?.to_mat()?;

    for hand in hands {
        let mut pts = Vector::<Point>::new();
        for p in &hand.landmarks.points {
            pts.push(Point::new(
                (p.x * width as f32) as i32,
                (p.y * height as f32) as i32,
            ));
        }
        let mut contours = Vector::<Vector<Point>>::new();
        contours.push(pts);

        let canvas = match hand.side {
            HandSide::Left => &mut left,
            HandSide::Right => &mut right,
        };
        polylines(canvas, &contours, true, Scalar::all(255.0), 1, LINE_8, 0)?;
    }

    Ok(HandMasks {
        left: upscale_nearest(&left, upscale)?,
        right: upscale_nearest(&right, upscale)?,
    })
}

fn upscale_nearest(mask: &Mat, factor: f64) -> Result<Mat> {
    let mut out = Mat::default();
    imgproc::resize(
        mask,
        &mut out,
        Size::new(0, 0),
        factor,
        factor,
        imgproc::INTER_NEAREST,
    )?;
    Ok(out)
}

pub fn is_blank(mask: &Mat) -> Result<bool> {
    Ok(core::count_non_zero(mask)? == 0)
}
