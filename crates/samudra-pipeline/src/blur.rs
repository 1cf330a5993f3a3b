//! Gaussian blur for noise reduction before thresholding.
//!
//! Smooths the grayscale image the fish detector thresholds,
//! suppressing high-frequency texture (sand, particles, caustics) that
//! would otherwise fragment the foreground mask. The kernel has a fixed
//! odd number of taps and is applied separably with
//! [`imageproc::filter::separable_filter_equal`]; samples past the
//! border repeat the edge pixel.

use image::{GrayImage, ImageBuffer, Luma};

/// Sigma conventionally paired with an odd Gaussian kernel size:
/// `0.3 * ((k - 1) * 0.5 - 1) + 0.8`.
///
/// A 5x5 kernel gives sigma 1.1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sigma_for_kernel(kernel_size: u32) -> f32 {
    let k = kernel_size as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian weights, `kernel_size` taps long, with
/// sigma from [`sigma_for_kernel`].
///
/// An even size is rounded up to the next odd one; zero gives the
/// single-tap identity.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_kernel(kernel_size: u32) -> Vec<f32> {
    let half = kernel_size / 2;
    let size = 2 * half + 1;
    let sigma = sigma_for_kernel(size);
    let denom = 2.0 * sigma * sigma;

    let weights: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half as f32;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Gaussian blur with a `kernel_size x kernel_size` support.
///
/// Pixels more than `kernel_size / 2` away never influence each other.
/// A size of 0 or 1 returns the image unchanged.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur_kernel(image: &GrayImage, kernel_size: u32) -> GrayImage {
    if kernel_size <= 1 {
        return image.clone();
    }

    // Filter in f32 and round once at the end; two 8-bit passes would
    // truncate twice.
    let samples: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(image.width(), image.height(), |x, y| {
            Luma([f32::from(image.get_pixel(x, y).0[0])])
        });
    let blurred = imageproc::filter::separable_filter_equal(&samples, &gaussian_kernel(kernel_size));
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([to_u8(blurred.get_pixel(x, y).0[0])])
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a test image with a sharp black-to-white boundary at x=5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn five_by_five_kernel_sigma() {
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-6);
        assert!((sigma_for_kernel(3) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(5);
        assert_eq!(k.len(), 5);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!((k[0] - k[4]).abs() < 1e-7 && (k[1] - k[3]).abs() < 1e-7);
        assert!(k[2] > k[1] && k[1] > k[0]);
    }

    #[test]
    fn unit_kernel_returns_identical_image() {
        let img = sharp_edge_image();
        assert_eq!(gaussian_blur_kernel(&img, 1), img);
        assert_eq!(gaussian_blur_kernel(&img, 0), img);
    }

    #[test]
    fn support_is_exactly_the_kernel_size() {
        let mut img = GrayImage::new(11, 11);
        img.put_pixel(5, 5, image::Luma([255]));
        let blurred = gaussian_blur_kernel(&img, 5);

        // Two taps either side of the source along each axis...
        for (x, y) in [(3, 5), (7, 5), (5, 3), (5, 7)] {
            assert!(blurred.get_pixel(x, y).0[0] > 0, "({x}, {y}) not reached");
        }
        // ...and nothing beyond.
        for (x, y) in blurred.enumerate_pixels().filter_map(|(x, y, p)| {
            (p.0[0] > 0).then_some((x, y))
        }) {
            assert!(
                x.abs_diff(5) <= 2 && y.abs_diff(5) <= 2,
                "({x}, {y}) lies outside the 5x5 support"
            );
        }
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        let blurred = gaussian_blur_kernel(&img, 5);
        assert_eq!(blurred.width(), 17);
        assert_eq!(blurred.height(), 31);
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let img = sharp_edge_image();
        let blurred = gaussian_blur_kernel(&img, 5);

        let left_of_edge = blurred.get_pixel(4, 5).0[0];
        let right_of_edge = blurred.get_pixel(5, 5).0[0];

        assert!(
            left_of_edge > 0,
            "expected blur to raise left-of-edge above 0, got {left_of_edge}",
        );
        assert!(
            right_of_edge < 255,
            "expected blur to lower right-of-edge below 255, got {right_of_edge}",
        );
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = GrayImage::from_fn(10, 10, |_, _| image::Luma([128]));
        let blurred = gaussian_blur_kernel(&img, 5);
        for pixel in blurred.pixels() {
            assert_eq!(
                pixel.0[0], 128,
                "expected uniform image to stay at 128 after blur"
            );
        }
    }
}
