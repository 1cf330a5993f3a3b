//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The image is divided into a `tile_grid x tile_grid` grid of equally
//! sized tiles. Each tile gets its own equalization lookup table built
//! from a clipped histogram; every output pixel blends the tables of
//! the four nearest tile centers bilinearly, which hides tile seams.
//!
//! When the image does not divide evenly, tiles are sized by rounding
//! up and the image is virtually extended with reflect-101 borders, so
//! every tile covers the same number of samples. A uniform input
//! therefore stays uniform.

use image::{GrayImage, Luma};

/// Number of histogram bins for 8-bit samples.
const BINS: usize = 256;

/// Largest tile count per axis.
pub const MAX_TILE_GRID: u32 = 256;

/// Map an out-of-range coordinate back into `0..len` by mirroring
/// without repeating the edge sample (`dcb|abcd|cba`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn reflect_101(i: i64, len: u32) -> u32 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (i64::from(len) - 1);
    let i = i.rem_euclid(period);
    // `i` is in `0..period`, so both arms are in `0..len`.
    if i < i64::from(len) {
        i as u32
    } else {
        (period - i) as u32
    }
}

/// Clip `hist` at `limit` and spread the clipped excess evenly.
///
/// Whatever does not divide evenly across all bins is handed out one
/// sample at a time at a fixed stride from the first bin.
fn clip_histogram(hist: &mut [u32; BINS], limit: u32) {
    let mut excess: u32 = 0;
    for count in hist.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let bins = BINS as u32;
    let batch = excess / bins;
    let mut residual = excess - batch * bins;
    for count in hist.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (bins / residual).max(1) as usize;
        for count in hist.iter_mut().step_by(step) {
            if residual == 0 {
                break;
            }
            *count += 1;
            residual -= 1;
        }
    }
}

/// Build the equalization table for one clipped histogram.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn build_lut(hist: &[u32; BINS], tile_area: u32) -> [u8; BINS] {
    let scale = 255.0 / tile_area as f32;
    let mut lut = [0u8; BINS];
    let mut sum: u32 = 0;
    for (entry, &count) in lut.iter_mut().zip(hist) {
        sum += count;
        *entry = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Interpolation coordinates along one axis: the two neighbouring tile
/// indices and the weight of the second.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn axis_weights(pos: u32, tile_size: u32, tiles: u32) -> (usize, usize, f32) {
    let t = (pos as f32).mul_add(1.0 / tile_size as f32, -0.5);
    let lo = t.floor();
    let weight = t - lo;
    let lo = lo as i64;
    let first = lo.clamp(0, i64::from(tiles) - 1) as usize;
    let second = (lo + 1).clamp(0, i64::from(tiles) - 1) as usize;
    (first, second, weight)
}

/// Apply CLAHE to a grayscale image.
///
/// `clip_limit` is relative to a flat histogram: a tile's bins are
/// capped at `clip_limit * tile_area / 256` samples (at least one).
/// `tile_grid` is the number of tiles along each axis; it is clamped
/// to `1..=MAX_TILE_GRID`.
///
/// Output dimensions always match the input.
#[must_use = "returns the equalized image"]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn clahe(image: &GrayImage, clip_limit: f32, tile_grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tiles = tile_grid.clamp(1, MAX_TILE_GRID);
    let tile_w = width.div_ceil(tiles);
    let tile_h = height.div_ceil(tiles);
    let tile_area = tile_w * tile_h;
    let limit = ((clip_limit * tile_area as f32 / BINS as f32) as u32).max(1);

    let mut luts: Vec<[u8; BINS]> = Vec::with_capacity(tiles as usize * tiles as usize);
    for ty in 0..tiles {
        for tx in 0..tiles {
            let mut hist = [0u32; BINS];
            for j in 0..tile_h {
                let y = reflect_101(i64::from(ty * tile_h + j), height);
                for i in 0..tile_w {
                    let x = reflect_101(i64::from(tx * tile_w + i), width);
                    hist[usize::from(image.get_pixel(x, y).0[0])] += 1;
                }
            }
            clip_histogram(&mut hist, limit);
            luts.push(build_lut(&hist, tile_area));
        }
    }

    let lut_at = |tx: usize, ty: usize| &luts[ty * tiles as usize + tx];
    let columns: Vec<(usize, usize, f32)> = (0..width)
        .map(|x| axis_weights(x, tile_w, tiles))
        .collect();

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let (ty1, ty2, ya) = axis_weights(y, tile_h, tiles);
        for (x, &(tx1, tx2, xa)) in (0..width).zip(&columns) {
            let v = usize::from(image.get_pixel(x, y).0[0]);
            let top = f32::from(lut_at(tx1, ty1)[v])
                .mul_add(1.0 - xa, f32::from(lut_at(tx2, ty1)[v]) * xa);
            let bottom = f32::from(lut_at(tx1, ty2)[v])
                .mul_add(1.0 - xa, f32::from(lut_at(tx2, ty2)[v]) * xa);
            let value = top.mul_add(1.0 - ya, bottom * ya);
            out.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}
