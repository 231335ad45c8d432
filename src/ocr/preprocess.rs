use image::{GrayImage, ImageBuffer, Luma, RgbImage};

/// Side of the neighbourhood used for the local threshold. Spans several
/// glyph widths of a typical chat font.
pub const ADAPTIVE_BLOCK_SIZE: usize = 31;

/// Subtracted from the local mean before comparing.
pub const ADAPTIVE_BIAS: f32 = 9.0;

/// Kernel side of the de-aliasing blur.
pub const BLUR_KERNEL_SIZE: usize = 3;

/// Converts a captured chat region into a black/white image for Tesseract.
///
/// Steps: grayscale, 3x3 Gaussian blur, adaptive Gaussian threshold,
/// then a 2x2 morphological closing to reconnect strokes the threshold broke.
///
/// Small anti-aliased game text on a moving background defeats a single
/// global threshold, hence the local one.
pub fn preprocess(img: &RgbImage) -> GrayImage {
    let gray = to_grayscale(img);
    let blurred = gaussian_blur(&gray, BLUR_KERNEL_SIZE);
    let binary = adaptive_threshold(&blurred, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_BIAS);
    close_2x2(&binary)
}

/// Converts to single-channel luma using the ITU-R BT.601 weights.
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let r = pixel[0] as f32;
        let g = pixel[1] as f32;
        let b = pixel[2] as f32;
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        output.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }

    output
}

/// Separable Gaussian blur with an odd kernel size. Sigma is derived from
/// the size the same way OpenCV does when sigma is left at 0.
pub fn gaussian_blur(img: &GrayImage, kernel_size: usize) -> GrayImage {
    let (width, height) = img.dimensions();
    let src: Vec<f32> = img.pixels().map(|p| p[0] as f32).collect();
    let blurred = convolve_separable(
        &src,
        width as usize,
        height as usize,
        kernel_size,
        Border::Reflect101,
    );

    let data = blurred
        .into_iter()
        .map(|v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| img.clone())
}

/// Adaptive Gaussian threshold: a pixel is white when it is brighter than
/// its Gaussian-weighted neighbourhood mean minus `bias`, black otherwise.
///
/// The neighbourhood mean repeats the edge pixel past the image border
/// (OpenCV's `BORDER_REPLICATE`), unlike the blur.
pub fn adaptive_threshold(img: &GrayImage, block_size: usize, bias: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let src: Vec<f32> = img.pixels().map(|p| p[0] as f32).collect();
    let local_mean = convolve_separable(
        &src,
        width as usize,
        height as usize,
        block_size,
        Border::Replicate,
    );

    let data = src
        .iter()
        .zip(local_mean.iter())
        .map(|(&value, &mean)| {
            if value > mean.round() - bias {
                255u8
            } else {
                0u8
            }
        })
        .collect();
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| img.clone())
}

/// Morphological closing (dilate, then erode) with a 2x2 element anchored
/// at its bottom-right cell. Neighbours outside the image are ignored.
pub fn close_2x2(img: &GrayImage) -> GrayImage {
    let dilated = morph_2x2(img, u8::max);
    morph_2x2(&dilated, u8::min)
}

fn morph_2x2(img: &GrayImage, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = img.dimensions();
    ImageBuffer::from_fn(width, height, |x, y| {
        let mut value = img.get_pixel(x, y)[0];
        if x > 0 {
            value = pick(value, img.get_pixel(x - 1, y)[0]);
        }
        if y > 0 {
            value = pick(value, img.get_pixel(x, y - 1)[0]);
        }
        if x > 0 && y > 0 {
            value = pick(value, img.get_pixel(x - 1, y - 1)[0]);
        }
        Luma([value])
    })
}

fn sigma_for_kernel(kernel_size: usize) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gaussian_kernel(kernel_size: usize) -> Vec<f32> {
    let sigma = sigma_for_kernel(kernel_size);
    let radius = (kernel_size / 2) as f32;
    let weights: Vec<f32> = (0..kernel_size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Mirrors an out-of-range index back into `0..len` without repeating the
/// edge pixel (`gfedcb|abcdefgh|gfedcba`).
fn reflect_101(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * (len - 1) - i;
        } else {
            return i as usize;
        }
    }
}

/// How samples past the image edge are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Border {
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
}

impl Border {
    fn index(self, index: isize, len: usize) -> usize {
        match self {
            Border::Reflect101 => reflect_101(index, len),
            Border::Replicate => index.clamp(0, len as isize - 1) as usize,
        }
    }
}

fn convolve_separable(
    src: &[f32],
    width: usize,
    height: usize,
    kernel_size: usize,
    border: Border,
) -> Vec<f32> {
    let kernel = gaussian_kernel(kernel_size);
    let radius = (kernel_size / 2) as isize;

    let mut horizontal = vec![0f32; src.len()];
    for y in 0..height {
        let row = &src[y * width..(y + 1) * width];
        for x in 0..width {
            horizontal[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * row[border.index(x as isize + k as isize - radius, width)])
                .sum();
        }
    }

    let mut output = vec![0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            output[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let sy = border.index(y as isize + k as isize - radius, height);
                    w * horizontal[sy * width + x]
                })
                .sum();
        }
    }

    output
}
