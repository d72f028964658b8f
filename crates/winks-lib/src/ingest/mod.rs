//! Signal ingestion: turn a video (or the cached arrays extracted from it) into a
//! [`Recording`] of two light intensities on a shared timeline.
//!
//! Decoding itself lives behind [`VideoDecoder`]; this module only samples two
//! fixed pixels per frame and owns the sample cache.

pub mod synthetic;

use log::{debug, info};
use std::path::Path;

use crate::config::{AnalysisConfig, ColorChannel, Pixel, SourceConfig};
use crate::error::{Result, WinkError};
use crate::io::cache::Cache;
use crate::signal::Recording;

pub use synthetic::SyntheticVideo;

const PROGRESS_EVERY: usize = 1000;

/// Random access to the RGB value of a decoded frame.
pub trait PixelImage {
    /// `None` when the pixel lies outside the image.
    fn rgb(&self, pixel: Pixel) -> Option<[u8; 3]>;
}

/// One decoded frame with its presentation time in seconds.
pub struct VideoFrame {
    pub time: f64,
    pub image: Box<dyn PixelImage>,
}

/// A lazily decoded stream of frames.
pub trait FrameSource {
    /// Next frame in presentation order, `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;
}

/// Opens video files for decoding.
pub trait VideoDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>>;
}

/// Decoder used when no codec backend is linked in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedDecoder;

impl VideoDecoder for UnsupportedDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Err(WinkError::DataUnavailable(format!(
            "no video decoder available for {}; populate the cache or use a synthetic source",
            path.display()
        )))
    }
}

/// Tightly packed 8-bit RGB image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl RgbImage {
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width * height * 3)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        if data.len() != width * height * 3 {
            return Err(WinkError::MalformedData(format!(
                "{}x{} RGB image needs {} bytes, got {}",
                width,
                height,
                width * height * 3,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn set(&mut self, pixel: Pixel, rgb: [u8; 3]) {
        if pixel.row < self.height && pixel.col < self.width {
            let at = (pixel.row * self.width + pixel.col) * 3;
            self.data[at..at + 3].copy_from_slice(&rgb);
        }
    }
}

impl PixelImage for RgbImage {
    fn rgb(&self, pixel: Pixel) -> Option<[u8; 3]> {
        if pixel.row >= self.height || pixel.col >= self.width {
            return None;
        }
        let at = (pixel.row * self.width + pixel.col) * 3;
        Some([self.data[at], self.data[at + 1], self.data[at + 2]])
    }
}

/// Drain `source`, sampling both light pixels of every frame as intensities in [0, 1].
pub fn sample_frames(
    source: &mut dyn FrameSource,
    lights: [Pixel; 2],
    color: ColorChannel,
) -> Result<Recording> {
    let mut times = Vec::new();
    let mut light1 = Vec::new();
    let mut light2 = Vec::new();
    while let Some(frame) = source.next_frame()? {
        let mut levels = [0.0; 2];
        for (level, pixel) in levels.iter_mut().zip(lights) {
            let rgb = frame.image.rgb(pixel).ok_or_else(|| {
                WinkError::DataUnavailable(format!(
                    "pixel (row {}, col {}) outside frame at {:.3}s",
                    pixel.row, pixel.col, frame.time
                ))
            })?;
            *level = f64::from(color.pick(rgb)) / 255.0;
        }
        times.push(frame.time);
        light1.push(levels[0]);
        light2.push(levels[1]);
        if times.len() % PROGRESS_EVERY == 0 {
            debug!(
                "decoded up to {:02}:{:05.2}",
                (frame.time / 60.0).floor() as u64,
                frame.time % 60.0
            );
        }
    }
    if times.is_empty() {
        return Err(WinkError::DataUnavailable("video contains no frames".into()));
    }
    Recording::new(times, light1, light2)
}

/// Decode the configured source and persist the samples into the cache.
pub fn populate_cache(config: &AnalysisConfig, decoder: &dyn VideoDecoder) -> Result<Recording> {
    let mut source: Box<dyn FrameSource> = match &config.source {
        SourceConfig::Video { path } => {
            if !path.is_file() {
                return Err(WinkError::DataUnavailable(format!(
                    "video file {} not found",
                    path.display()
                )));
            }
            info!("decoding video {}", path.display());
            decoder.open(path).map_err(|e| as_unavailable(path, e))?
        }
        SourceConfig::Synthetic(synthetic) => {
            info!(
                "generating synthetic lights at {} Hz and {} Hz",
                synthetic.frequencies[0], synthetic.frequencies[1]
            );
            Box::new(SyntheticVideo::new(synthetic.clone(), config.lights)?)
        }
    };
    let recording = sample_frames(source.as_mut(), config.lights, config.color_channel)
        .map_err(|e| match &config.source {
            SourceConfig::Video { path } => as_unavailable(path, e),
            SourceConfig::Synthetic(_) => e,
        })?;
    let cache = Cache::new(&config.cache.dir);
    cache.write_samples(&recording)?;
    info!(
        "cached {} frames ({:.1}s) in {}",
        recording.len(),
        recording.duration(),
        cache.dir().display()
    );
    Ok(recording)
}

/// Load both light series, decoding the source first on a cold cache, then
/// apply the configured duration limit.
pub fn load(config: &AnalysisConfig, decoder: &dyn VideoDecoder) -> Result<Recording> {
    let cache = Cache::new(&config.cache.dir);
    if cache.has_samples() {
        info!("loading cached samples from {}", cache.dir().display());
    } else {
        info!("sample cache {} is empty", cache.dir().display());
        populate_cache(config, decoder)?;
    }
    // always analyze exactly what was persisted
    let mut recording = cache.read_samples()?;
    if let Some(limit) = config.max_duration {
        recording.truncate(limit);
        debug!("kept {} samples before {limit}s", recording.len());
        if recording.len() < 2 {
            return Err(WinkError::MalformedData(format!(
                "only {} samples recorded before {limit}s",
                recording.len()
            )));
        }
    }
    Ok(recording)
}

fn as_unavailable(path: &Path, err: WinkError) -> WinkError {
    match err {
        WinkError::DataUnavailable(_) => err,
        other => WinkError::DataUnavailable(format!("decoding {} failed: {other}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyntheticConfig;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct ScriptedFrames(VecDeque<Result<Option<VideoFrame>>>);

    impl FrameSource for ScriptedFrames {
        fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn frame(time: f64, a: u8, b: u8) -> VideoFrame {
        let mut image = RgbImage::filled(4, 3, [0, 0, 0]);
        image.set(Pixel::new(1, 2), [a, 10, 20]);
        image.set(Pixel::new(2, 0), [b, 30, 40]);
        VideoFrame {
            time,
            image: Box::new(image),
        }
    }

    const LIGHTS: [Pixel; 2] = [Pixel::new(1, 2), Pixel::new(2, 0)];

    #[test]
    fn samples_selected_channel_normalized() {
        let mut source = ScriptedFrames(VecDeque::from(vec![
            Ok(Some(frame(0.0, 255, 0))),
            Ok(Some(frame(0.04, 51, 102))),
        ]));
        let rec = sample_frames(&mut source, LIGHTS, ColorChannel::Red).expect("sample");
        assert_eq!(rec.times, vec![0.0, 0.04]);
        assert_eq!(rec.light1, vec![1.0, 0.2]);
        assert_eq!(rec.light2, vec![0.0, 0.4]);

        let mut source = ScriptedFrames(VecDeque::from(vec![Ok(Some(frame(0.0, 0, 0)))]));
        let rec = sample_frames(&mut source, LIGHTS, ColorChannel::Blue).expect("sample");
        assert_eq!(rec.light1, vec![20.0 / 255.0]);
    }

    #[test]
    fn raw_image_lookup_is_row_major() {
        let data: Vec<u8> = (0..18).collect();
        let image = RgbImage::from_raw(3, 2, data).expect("image");
        assert_eq!(image.rgb(Pixel::new(0, 0)), Some([0, 1, 2]));
        assert_eq!(image.rgb(Pixel::new(1, 2)), Some([15, 16, 17]));
        assert_eq!(image.rgb(Pixel::new(2, 0)), None);
        assert!(RgbImage::from_raw(3, 2, vec![0; 17]).is_err());
    }

    #[test]
    fn pixel_outside_frame_is_unavailable() {
        let mut source = ScriptedFrames(VecDeque::from(vec![Ok(Some(frame(0.0, 1, 1)))]));
        let err = sample_frames(&mut source, [Pixel::new(9, 9), LIGHTS[1]], ColorChannel::Red)
            .unwrap_err();
        assert!(matches!(err, WinkError::DataUnavailable(_)));
    }

    #[test]
    fn missing_video_is_data_unavailable() {
        let dir = tempdir().unwrap();
        let mut config = AnalysisConfig::default();
        config.cache.dir = dir.path().join("cache");
        config.source = SourceConfig::Video {
            path: dir.path().join("missing.mp4"),
        };
        let err = load(&config, &UnsupportedDecoder).unwrap_err();
        assert!(matches!(err, WinkError::DataUnavailable(_)));
        assert!(!Cache::new(&config.cache.dir).has_samples());
    }

    #[test]
    fn decoder_failure_is_data_unavailable() {
        struct Broken;
        impl VideoDecoder for Broken {
            fn open(&self, _path: &Path) -> Result<Box<dyn FrameSource>> {
                Ok(Box::new(ScriptedFrames(VecDeque::from(vec![Err(
                    WinkError::MalformedData("corrupt packet".into()),
                )]))))
            }
        }
        let dir = tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let mut config = AnalysisConfig::default();
        config.cache.dir = dir.path().join("cache");
        config.source = SourceConfig::Video { path: video };
        match load(&config, &Broken).unwrap_err() {
            WinkError::DataUnavailable(msg) => assert!(msg.contains("corrupt packet"), "{msg}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cold_cache_is_populated_then_reused() {
        let dir = tempdir().unwrap();
        let mut config = AnalysisConfig::default();
        config.cache.dir = dir.path().join("cache");
        config.lights = LIGHTS;
        config.source = SourceConfig::Synthetic(SyntheticConfig {
            duration: 4.0,
            ..SyntheticConfig::default()
        });
        let first = load(&config, &UnsupportedDecoder).expect("populate");
        assert_eq!(first.len(), 120);

        // a second load must not need the source any more
        config.source = SourceConfig::Video {
            path: dir.path().join("gone.mp4"),
        };
        let second = load(&config, &UnsupportedDecoder).expect("cache hit");
        assert_eq!(first, second);
    }

    #[test]
    fn load_applies_duration_limit() {
        let dir = tempdir().unwrap();
        let mut config = AnalysisConfig::default();
        config.cache.dir = dir.path().to_path_buf();
        config.lights = LIGHTS;
        config.source = SourceConfig::Synthetic(SyntheticConfig {
            duration: 4.0,
            ..SyntheticConfig::default()
        });
        config.max_duration = Some(1.0);
        let rec = load(&config, &UnsupportedDecoder).expect("load");
        assert!(rec.times.iter().all(|t| *t < 1.0));
        assert_eq!(rec.len(), 30);
        assert_eq!(Cache::new(dir.path()).read_samples().unwrap().len(), 120);

        config.max_duration = Some(1e-6);
        assert!(matches!(
            load(&config, &UnsupportedDecoder),
            Err(WinkError::MalformedData(_))
        ));
    }
}
