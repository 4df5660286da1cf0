use std::time::Duration;

use image::DynamicImage;
use image::imageops::FilterType;
use tokio::time::timeout;

pub const DEFAULT_MAX_EDGE: u32 = 300;
pub const DEFAULT_QUALITY: f32 = 85.0;

const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_TOTAL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct TranscodedImage {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Decodes an input image, scales its longest edge down to `max_edge`
/// (never upscaling), and re-encodes it as lossy WebP. Any failure mode
/// — undecodable input, empty encoder output, or either timeout — comes
/// back as `None` so one bad file cannot stall a batch.
#[derive(Debug, Clone, Copy)]
pub struct Transcoder {
    max_edge: u32,
    quality: f32,
    decode_timeout: Duration,
    total_timeout: Duration,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            quality: DEFAULT_QUALITY,
            decode_timeout: DEFAULT_DECODE_TIMEOUT,
            total_timeout: DEFAULT_TOTAL_TIMEOUT,
        }
    }
}

impl Transcoder {
    pub fn new(max_edge: u32, quality: f32) -> Self {
        Self {
            max_edge: max_edge.max(1),
            quality,
            ..Self::default()
        }
    }

    pub fn with_timeouts(mut self, decode: Duration, total: Duration) -> Self {
        self.decode_timeout = decode;
        self.total_timeout = total;
        self
    }

    pub async fn transcode(&self, name: &str, bytes: Vec<u8>) -> Option<TranscodedImage> {
        let encoded = timeout(self.total_timeout, self.convert(bytes))
            .await
            .ok()
            .flatten()?;
        Some(TranscodedImage {
            name: webp_name(name),
            bytes: encoded,
        })
    }

    async fn convert(&self, bytes: Vec<u8>) -> Option<Vec<u8>> {
        // The decode timeout abandons the blocking task rather than
        // interrupting it; the caller still gets its answer in time.
        let decoded = timeout(
            self.decode_timeout,
            tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).ok()),
        )
        .await
        .ok()?
        .ok()??;

        let max_edge = self.max_edge;
        let quality = self.quality;
        let encoded = tokio::task::spawn_blocking(move || encode_webp(&decoded, max_edge, quality))
            .await
            .ok()??;
        if encoded.is_empty() {
            return None;
        }
        Some(encoded)
    }
}

/// Output keeps the input's base name (up to the first dot) with the new
/// format's extension.
fn webp_name(input: &str) -> String {
    let base = input.split('.').next().unwrap_or(input);
    format!("{base}.webp")
}

fn encode_webp(image: &DynamicImage, max_edge: u32, quality: f32) -> Option<Vec<u8>> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return None;
    }
    let longest = width.max(height);
    let resized;
    let source = if longest > max_edge {
        let scale = f64::from(max_edge) / f64::from(longest);
        let target_w = (f64::from(width) * scale).round().max(1.0) as u32;
        let target_h = (f64::from(height) * scale).round().max(1.0) as u32;
        resized = image.resize_exact(target_w, target_h, FilterType::Triangle);
        &resized
    } else {
        image
    };
    let rgba = source.to_rgba8();
    let (w, h) = rgba.dimensions();
    let encoder = webp::Encoder::from_rgba(rgba.as_raw(), w, h);
    Some(encoder.encode(quality).to_vec())
}
