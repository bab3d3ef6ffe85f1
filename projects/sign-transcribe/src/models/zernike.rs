// Zernike-moment shape descriptor.
//
// The diagram is binarized at its mean intensity, centered on its center of
// mass, and projected onto the Zernike polynomials V_nl inside a disk of the
// configured radius. Magnitudes |A_nl| are rotation invariant.

use super::ShapeDescriptor;
use image::GrayImage;
use std::f64::consts::PI;
use std::path::Path;

/// Number of moments produced for `degree`: pairs (n, l) with
/// `0 <= l <= n <= degree` and `n - l` even.
pub fn zernike_len(degree: usize) -> usize {
    (0..=degree).map(|n| n / 2 + 1).sum()
}

fn factorial(n: usize) -> f64 {
    (1..=n).fold(1.0, |acc, k| acc * k as f64)
}

/// Coefficients of the radial polynomial R_nl as (power of rho, weight).
fn radial_terms(n: usize, l: usize) -> Vec<(i32, f64)> {
    (0..=(n - l) / 2)
        .map(|m| {
            let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
            let weight = sign * factorial(n - m)
                / (factorial(m) * factorial((n + l) / 2 - m) * factorial((n - l) / 2 - m));
            ((n - 2 * m) as i32, weight)
        })
        .collect()
}

/// Absolute Zernike moments of `image` after mean-thresholding.
///
/// Returns all zeros when no pixel is above the mean.
pub fn zernike_moments(image: &GrayImage, radius: f64, degree: usize) -> Vec<f64> {
    let len = zernike_len(degree);
    let pixels = image.as_raw();
    if pixels.is_empty() || radius <= 0.0 {
        return vec![0.0; len];
    }

    let mean = pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64;
    let width = image.width() as usize;
    let foreground: Vec<(f64, f64)> = pixels
        .iter()
        .enumerate()
        .filter(|(_, &p)| p as f64 > mean)
        .map(|(i, _)| ((i % width) as f64, (i / width) as f64))
        .collect();
    if foreground.is_empty() {
        return vec![0.0; len];
    }

    let count = foreground.len() as f64;
    let cx = foreground.iter().map(|(x, _)| x).sum::<f64>() / count;
    let cy = foreground.iter().map(|(_, y)| y).sum::<f64>() / count;

    // (rho, theta) of every foreground pixel inside the unit disk.
    let polar: Vec<(f64, f64)> = foreground
        .iter()
        .filter_map(|(x, y)| {
            let xn = (x - cx) / radius;
            let yn = (y - cy) / radius;
            let rho = (xn * xn + yn * yn).sqrt();
            (rho <= 1.0).then(|| (rho, yn.atan2(xn)))
        })
        .collect();
    if polar.is_empty() {
        return vec![0.0; len];
    }
    let weight = 1.0 / polar.len() as f64;

    let mut moments = Vec::with_capacity(len);
    for n in 0..=degree {
        for l in (0..=n).filter(|l| (n - l) % 2 == 0) {
            let terms = radial_terms(n, l);
            let (mut re, mut im) = (0.0, 0.0);
            for &(rho, theta) in &polar {
                let r: f64 = terms.iter().map(|&(p, w)| w * rho.powi(p)).sum();
                let angle = l as f64 * theta;
                re += weight * r * angle.cos();
                im -= weight * r * angle.sin();
            }
            let scale = (n as f64 + 1.0) / PI;
            moments.push(scale * re.hypot(im));
        }
    }
    moments
}

/// File-backed Zernike descriptor for shape diagrams.
pub struct ZernikeDescriptor {
    radius: f64,
    degree: usize,
}

impl ZernikeDescriptor {
    pub fn new(radius: u32, degree: usize) -> Self {
        Self {
            radius: radius as f64,
            degree,
        }
    }
}

impl ShapeDescriptor for ZernikeDescriptor {
    fn dim(&self) -> usize {
        zernike_len(self.degree)
    }

    fn describe(&self, diagram: &Path) -> Vec<f32> {
        match image::open(diagram) {
            Ok(img) => zernike_moments(&img.to_luma8(), self.radius, self.degree)
                .into_iter()
                .map(|v| v as f32)
                .collect(),
            Err(e) => {
                tracing::warn!("Zernike error processing {:?}: {}", diagram, e);
                vec![0.0; self.dim()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn disk(size: u32, r: f64) -> GrayImage {
        let c = (size as f64 - 1.0) / 2.0;
        GrayImage::from_fn(size, size, |x, y| {
            let d = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
            Luma([if d <= r { 255 } else { 0 }])
        })
    }

    #[test]
    fn test_descriptor_length() {
        assert_eq!(zernike_len(8), 25);
        assert_eq!(zernike_len(0), 1);
        assert_eq!(zernike_moments(&disk(40, 10.0), 20.0, 8).len(), 25);
    }

    #[test]
    fn test_first_moment_is_one_over_pi() {
        let m = zernike_moments(&disk(60, 20.0), 25.0, 8);
        assert!((m[0] - 1.0 / PI).abs() < 1e-9);
        // A centered disk has no angular content.
        assert!(m[1] < 1e-6, "A_11 = {}", m[1]);
    }

    #[test]
    fn test_rotation_invariance() {
        let shape = GrayImage::from_fn(50, 50, |x, y| {
            let inside = (10..40).contains(&x) && (20..28).contains(&y)
                || (10..16).contains(&x) && (5..45).contains(&y);
            Luma([if inside { 255 } else { 0 }])
        });
        let rotated = image::imageops::rotate90(&shape);

        let a = zernike_moments(&shape, 30.0, 8);
        let b = zernike_moments(&rotated, 30.0, 8);
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < 1e-9, "moment {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_blank_image_is_zero() {
        let blank = GrayImage::new(30, 30);
        assert!(zernike_moments(&blank, 15.0, 8).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_undecodable_file_is_zero_vector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results-000.png");
        std::fs::write(&path, b"not a png").unwrap();

        let descriptor = ZernikeDescriptor::new(200, 8);
        let v = descriptor.describe(&path);
        assert_eq!(v.len(), 25);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_describe_png_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results-001.png");
        disk(64, 20.0).save(&path).unwrap();

        let v = ZernikeDescriptor::new(30, 8).describe(&path);
        assert_eq!(v.len(), 25);
        assert!((v[0] as f64 - 1.0 / PI).abs() < 1e-5);
    }
}
