use crate::config::{Pixel, SyntheticConfig};
use crate::error::Result;
use crate::ingest::{FrameSource, PixelImage, VideoFrame};

/// Renders two square-wave blinking lights as a camera would record them.
///
/// Each frame integrates the ideal on/off waveform over the open-shutter interval,
/// so edges that fall inside a frame produce intermediate levels.
#[derive(Debug, Clone)]
pub struct SyntheticVideo {
    config: SyntheticConfig,
    lights: [Pixel; 2],
    next: usize,
    frames: usize,
}

impl SyntheticVideo {
    pub fn new(config: SyntheticConfig, lights: [Pixel; 2]) -> Result<Self> {
        config.validate()?;
        let frames = (config.duration * config.frame_rate).round() as usize;
        Ok(Self {
            config,
            lights,
            next: 0,
            frames,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    fn level(&self, freq: f64, start: f64) -> u8 {
        let span = self.config.exposure / self.config.frame_rate;
        let lit = on_time(freq, self.config.duty_cycle, start + span)
            - on_time(freq, self.config.duty_cycle, start);
        let fraction = (lit / span).clamp(0.0, 1.0);
        let off = f64::from(self.config.off_level);
        let on = f64::from(self.config.on_level);
        (off + (on - off) * fraction).round() as u8
    }
}

/// Total time the light has been on during `[0, t]`; each period starts lit.
fn on_time(freq: f64, duty: f64, t: f64) -> f64 {
    let period = 1.0 / freq;
    let cycles = (t / period).floor();
    let rem = t - cycles * period;
    cycles * duty * period + rem.min(duty * period)
}

struct LitFrame {
    lights: [(Pixel, u8); 2],
    background: u8,
}

impl PixelImage for LitFrame {
    fn rgb(&self, pixel: Pixel) -> Option<[u8; 3]> {
        let value = self
            .lights
            .iter()
            .find(|(p, _)| *p == pixel)
            .map(|(_, v)| *v)
            .unwrap_or(self.background);
        Some([value; 3])
    }
}

impl FrameSource for SyntheticVideo {
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if self.next >= self.frames {
            return Ok(None);
        }
        let time = self.next as f64 / self.config.frame_rate;
        self.next += 1;
        let image = LitFrame {
            lights: [
                (self.lights[0], self.level(self.config.frequencies[0], time)),
                (self.lights[1], self.level(self.config.frequencies[1], time)),
            ],
            background: self.config.off_level,
        };
        Ok(Some(VideoFrame {
            time,
            image: Box::new(image),
        }))
    }
}
