//! Image to NCHW tensor conversion for recognition networks.

use anyhow::Result;
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// How pixel values are scaled after layout conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelScale {
    /// Values stay in [0, 255].
    Raw,
    /// (x - 127.5) / 127.5, roughly [-1, 1].
    Symmetric,
    /// x / 255, then each channel shifted to zero mean and unit std.
    Standardize,
    /// [`VGGFACE_MEANS`] subtracted from the tensor channels in order.
    VggMean,
}

/// Caffe VGG-Face training means, in B, G, R tensor order.
pub const VGGFACE_MEANS: [f32; 3] = [93.5940, 104.7624, 129.1863];

/// Input contract of a recognition network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preprocess {
    /// Square input side in pixels.
    pub size: u32,
    pub channels: ChannelOrder,
    pub scale: PixelScale,
}

const MIN_STD: f32 = 1e-6;

/// Resize `img` to the network input and lay it out as `[1, 3, size, size]`.
///
/// Grayscale sources are expanded to three identical channels.
pub fn to_tensor(img: &DynamicImage, prep: &Preprocess) -> Result<Array4<f32>> {
    let size = prep.size;
    let rgb = img
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let plane = (size * size) as usize;
    let mut data = vec![0.0f32; 3 * plane];
    {
        let (first, rest) = data.split_at_mut(plane);
        let (second, third) = rest.split_at_mut(plane);
        let (r, g, b) = match prep.channels {
            ChannelOrder::Rgb => (first, second, third),
            ChannelOrder::Bgr => (third, second, first),
        };
        for (i, px) in rgb.pixels().enumerate() {
            r[i] = px[0] as f32;
            g[i] = px[1] as f32;
            b[i] = px[2] as f32;
        }
    }

    match prep.scale {
        PixelScale::Raw => {}
        PixelScale::Symmetric => data.iter_mut().for_each(|v| *v = (*v - 127.5) / 127.5),
        PixelScale::Standardize => {
            for channel in data.chunks_mut(plane) {
                standardize(channel);
            }
        }
        PixelScale::VggMean => {
            for (channel, mean) in data.chunks_mut(plane).zip(VGGFACE_MEANS) {
                channel.iter_mut().for_each(|v| *v -= mean);
            }
        }
    }

    Ok(Array4::from_shape_vec(
        (1, 3, size as usize, size as usize),
        data,
    )?)
}

fn standardize(channel: &mut [f32]) {
    let n = channel.len();
    if n == 0 {
        return;
    }
    channel.iter_mut().for_each(|v| *v /= 255.0);
    let mean = channel.iter().sum::<f32>() / n as f32;
    // unbiased estimator, as torch.std does by default
    let denom = if n > 1 { (n - 1) as f32 } else { 1.0 };
    let var = channel.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / denom;
    let std = var.sqrt().max(MIN_STD);
    channel.iter_mut().for_each(|v| *v = (*v - mean) / std);
}
