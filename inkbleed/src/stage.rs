//! # Render stage
//!
//! One worker thread per canvas owns the paint buffers. Draw operations arrive in order over a
//! bounded channel, so a producer that outpaces mixing simply blocks on send.
//!
//! The stage keeps two display-space buffers. Each composite mixes paint into `target` reading
//! from `source`, then the two swap roles. The visible [`Surface`] only changes on a final,
//! non-sublayer composite, or on clear.

use std::sync::Arc;

use inkbleed_core::{color::Color, mask::Mask, mask::PixelRect, spectral};
use rayon::prelude::*;

use crate::error::EngineError;

/// The visible raster, shared with whoever presents it.
pub type Surface = Arc<parking_lot::Mutex<image::RgbaImage>>;

/// Mask coverage above which edges are deepened.
const BORDER_THRESHOLD: f32 = 0.7;
const BORDER_GAIN: f32 = 0.6;

pub enum Paint {
    /// Coverage mask painted with one color.
    Mask { mask: Mask, color: Color },
    /// A picture placed with its top-left corner at `x, y`.
    Image {
        image: image::RgbaImage,
        x: i64,
        y: i64,
    },
}

pub struct Composite {
    pub paint: Paint,
    /// Lift paint back towards the color instead of mixing pigment into it.
    pub erase: bool,
    /// Present the result when done, unless `sublayer`.
    pub last: bool,
    pub sublayer: bool,
}

pub enum StageMessage {
    /// Fill everything with a color and present it.
    Clear { color: Color },
    Composite(Composite),
    /// Reply with a copy of the visible surface once everything before it has been drawn.
    Read {
        reply: tokio::sync::oneshot::Sender<image::RgbaImage>,
    },
    /// Reply once everything before it has been drawn.
    Sync {
        reply: tokio::sync::oneshot::Sender<()>,
    },
    Shutdown,
}
impl std::fmt::Debug for StageMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clear { color } => write!(f, "Clear({})", color.hex()),
            Self::Composite(Composite {
                paint,
                erase,
                last,
                sublayer,
            }) => {
                let paint = match paint {
                    Paint::Mask { color, .. } => color.hex(),
                    Paint::Image { .. } => "image".to_owned(),
                };
                write!(
                    f,
                    "Composite({paint}, erase: {erase}, last: {last}, sublayer: {sublayer})"
                )
            }
            Self::Read { .. } => f.write_str("Read"),
            Self::Sync { .. } => f.write_str("Sync"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

fn to_unit(channel: u8) -> f32 {
    f32::from(channel) / 255.0
}
fn to_byte(channel: f32) -> u8 {
    az::saturating_cast::<f32, u8>((channel.clamp(0.0, 1.0) * 255.0).round())
}

/// Mask coverage after edge deepening.
fn deepen(coverage: f32) -> f32 {
    if coverage > BORDER_THRESHOLD {
        (coverage + (coverage - BORDER_THRESHOLD) * BORDER_GAIN).min(1.0)
    } else {
        coverage
    }
}

fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// The worker-side state. Only ever touched by the stage thread.
pub struct RenderStage {
    width: usize,
    height: usize,
    source: Vec<[f32; 3]>,
    target: Vec<[f32; 3]>,
    surface: Surface,
}

impl RenderStage {
    /// Start from whatever the surface currently shows.
    #[must_use]
    pub fn new(surface: Surface) -> Self {
        let (width, height, source) = {
            let image = surface.lock();
            let source: Vec<[f32; 3]> = image
                .pixels()
                .map(|p| [to_unit(p[0]), to_unit(p[1]), to_unit(p[2])])
                .collect();
            (image.width() as usize, image.height() as usize, source)
        };
        Self {
            width,
            height,
            target: source.clone(),
            source,
            surface,
        }
    }
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }
    /// Display-space color of the accumulated paint at a pixel.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<[f32; 3]> {
        (x < self.width && y < self.height).then(|| self.source[y * self.width + x])
    }
    /// Handle one message. Returns `false` once the stage should stop.
    pub fn handle(&mut self, message: StageMessage) -> bool {
        log::trace!("stage: {message:?}");
        match message {
            StageMessage::Clear { color } => {
                let [r, g, b, _] = color.normalized();
                self.source.fill([r, g, b]);
                self.target.fill([r, g, b]);
                self.present();
            }
            StageMessage::Composite(composite) => self.composite(composite),
            StageMessage::Read { reply } => {
                let image = self.surface.lock().clone();
                if reply.send(image).is_err() {
                    log::warn!("stage read reply dropped");
                }
            }
            StageMessage::Sync { reply } => {
                if reply.send(()).is_err() {
                    log::warn!("stage sync reply dropped");
                }
            }
            StageMessage::Shutdown => return false,
        }
        true
    }
    fn composite(&mut self, composite: Composite) {
        let Composite {
            paint,
            erase,
            last,
            sublayer,
        } = composite;
        match paint {
            Paint::Mask { mask, color } => {
                if mask.width() != self.width || mask.height() != self.height {
                    log::error!(
                        "mask is {}x{}, stage is {}x{}, dropping it",
                        mask.width(),
                        mask.height(),
                        self.width,
                        self.height
                    );
                } else if let Some(rect) = mask.bounds() {
                    self.mix_mask(&mask, rect, color, erase);
                }
            }
            Paint::Image { image, x, y } => self.mix_image(&image, x, y),
        }
        if last && !sublayer {
            self.present();
        }
    }
    /// Mix `rect` of the target from the source, then swap and resync the scratch copy.
    fn mix_rows(&mut self, rect: PixelRect, mix: impl Fn(usize, usize, [f32; 3]) -> [f32; 3] + Sync) {
        let width = self.width;
        let source = &self.source;
        self.target
            .par_chunks_mut(width)
            .enumerate()
            .skip(rect.y)
            .take(rect.height)
            .for_each(|(y, row)| {
                for x in rect.x..rect.x + rect.width {
                    row[x] = mix(x, y, source[y * width + x]);
                }
            });
        std::mem::swap(&mut self.source, &mut self.target);
        for y in rect.y..rect.y + rect.height {
            let span = y * width + rect.x..y * width + rect.x + rect.width;
            self.target[span.clone()].copy_from_slice(&self.source[span]);
        }
    }
    fn mix_mask(&mut self, mask: &Mask, rect: PixelRect, color: Color, erase: bool) {
        let [r, g, b, a] = color.normalized();
        let paint_rgb = [r, g, b];
        let paint = spectral::Spectrum::from_srgb(paint_rgb);
        let width = self.width;
        let coverage = mask.coverage();
        self.mix_rows(rect, |x, y, under| {
            let cover = coverage[y * width + x];
            if cover <= 0.0 {
                return under;
            }
            if erase {
                lerp3(under, paint_rgb, cover * a)
            } else {
                spectral::Spectrum::from_srgb(under).mix_srgb(&paint, deepen(cover) * a)
            }
        });
    }
    fn mix_image(&mut self, image: &image::RgbaImage, x: i64, y: i64) {
        let clip = |origin: i64, len: u32, limit: usize| {
            let start = origin.max(0);
            let end = (origin + i64::from(len)).min(i64::try_from(limit).unwrap_or(i64::MAX));
            (start < end).then(|| (usize::try_from(start).ok(), usize::try_from(end).ok()))
        };
        let (Some((Some(x0), Some(x1))), Some((Some(y0), Some(y1)))) = (
            clip(x, image.width(), self.width),
            clip(y, image.height(), self.height),
        ) else {
            return;
        };
        let rect = PixelRect {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        };
        self.mix_rows(rect, |px, py, under| {
            // In range by construction of `rect`.
            let (ix, iy) = (px as i64 - x, py as i64 - y);
            let pixel = image.get_pixel(ix as u32, iy as u32);
            let alpha = to_unit(pixel[3]);
            if alpha <= 0.0 {
                return under;
            }
            spectral::mix_srgb(
                under,
                [to_unit(pixel[0]), to_unit(pixel[1]), to_unit(pixel[2])],
                alpha,
            )
        });
    }
    /// Copy the accumulated paint to the visible surface.
    fn present(&self) {
        let mut surface = self.surface.lock();
        if surface.width() as usize != self.width || surface.height() as usize != self.height {
            log::error!("surface was resized under the render stage, not presenting");
            return;
        }
        for (pixel, color) in surface.pixels_mut().zip(self.source.iter()) {
            *pixel = image::Rgba([to_byte(color[0]), to_byte(color[1]), to_byte(color[2]), 255]);
        }
    }
}

/// Owns the stage thread. Dropping the handle shuts the stage down after it drains its queue.
pub struct StageHandle {
    sender: crossbeam::channel::Sender<StageMessage>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl StageHandle {
    /// Start a stage drawing onto `surface`, buffering up to `capacity` messages.
    /// # Errors
    /// If the worker thread could not be started.
    pub fn spawn(surface: Surface, capacity: usize) -> Result<Self, EngineError> {
        let (sender, receiver) = crossbeam::channel::bounded::<StageMessage>(capacity.max(1));
        let worker = std::thread::Builder::new()
            .name("Render stage".to_owned())
            .spawn(move || {
                let mut stage = RenderStage::new(surface);
                log::debug!("render stage up, {}x{}", stage.width(), stage.height());
                defer::defer!(log::debug!("render stage down"));
                // Ends on shutdown or when every sender is gone.
                while let Ok(message) = receiver.recv() {
                    if !stage.handle(message) {
                        break;
                    }
                }
            })
            .map_err(EngineError::Spawn)?;
        Ok(Self {
            sender,
            worker: Some(worker),
        })
    }
    /// Queue a message, blocking while the queue is full.
    /// # Errors
    /// [`EngineError::StageClosed`] if the stage has stopped.
    pub fn send(&self, message: StageMessage) -> Result<(), EngineError> {
        self.sender.send(message).map_err(|_| {
            log::error!("render stage is gone, dropping draw");
            EngineError::StageClosed
        })
    }
    /// Copy of the visible surface after everything queued so far.
    /// # Errors
    /// [`EngineError::StageClosed`] if the stage stopped before replying.
    pub fn read(&self) -> Result<image::RgbaImage, EngineError> {
        let (reply, response) = tokio::sync::oneshot::channel();
        self.send(StageMessage::Read { reply })?;
        response.blocking_recv().map_err(|_| {
            log::error!("render stage dropped a read");
            EngineError::StageClosed
        })
    }
    /// Block until everything queued so far has been drawn.
    /// # Errors
    /// [`EngineError::StageClosed`] if the stage stopped before replying.
    pub fn sync(&self) -> Result<(), EngineError> {
        let (reply, response) = tokio::sync::oneshot::channel();
        self.send(StageMessage::Sync { reply })?;
        response.blocking_recv().map_err(|_| {
            log::error!("render stage dropped a sync");
            EngineError::StageClosed
        })
    }
}
impl Drop for StageHandle {
    fn drop(&mut self) {
        let _ = self.sender.send(StageMessage::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("render stage panicked");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn surface(width: u32, height: u32) -> Surface {
        Arc::new(parking_lot::Mutex::new(image::RgbaImage::new(width, height)))
    }
    fn painted(width: usize, height: usize, coverage: f32) -> Mask {
        let mut mask = Mask::new(width, height);
        mask.fill_polygon(
            &[
                inkbleed_core::Point::new(0.0, 0.0),
                inkbleed_core::Point::new(4.0, 0.0),
                inkbleed_core::Point::new(4.0, 4.0),
                inkbleed_core::Point::new(0.0, 4.0),
            ],
            coverage,
        )
        .unwrap();
        mask
    }
    fn composite(mask: Mask, color: Color, erase: bool, last: bool, sublayer: bool) -> StageMessage {
        StageMessage::Composite(Composite {
            paint: Paint::Mask { mask, color },
            erase,
            last,
            sublayer,
        })
    }
    #[test]
    fn clear_presents() {
        let surface = surface(8, 8);
        let mut stage = RenderStage::new(surface.clone());
        assert!(stage.handle(StageMessage::Clear {
            color: Color::rgb(255, 0, 0)
        }));
        assert_eq!(surface.lock().get_pixel(3, 3).0, [255, 0, 0, 255]);
        assert_eq!(stage.pixel(7, 7), Some([1.0, 0.0, 0.0]));
    }
    #[test]
    fn sublayers_wait_for_last() {
        let surface = surface(8, 8);
        let mut stage = RenderStage::new(surface.clone());
        stage.handle(StageMessage::Clear {
            color: Color::WHITE,
        });
        stage.handle(composite(painted(8, 8, 1.0), Color::BLACK, false, true, true));
        // Mixed, but not presented.
        assert!(stage.pixel(1, 1).unwrap()[0] < 0.5);
        assert_eq!(surface.lock().get_pixel(1, 1).0, [255, 255, 255, 255]);
        stage.handle(composite(Mask::new(8, 8), Color::BLACK, false, true, false));
        assert!(surface.lock().get_pixel(1, 1).0[0] < 128);
        // Outside the mask, untouched.
        assert_eq!(surface.lock().get_pixel(6, 6).0, [255, 255, 255, 255]);
    }
    #[test]
    fn pigment_mixing_is_chromatic() {
        let surface = surface(8, 8);
        let mut stage = RenderStage::new(surface);
        stage.handle(StageMessage::Clear {
            color: Color::rgb(0, 33, 133),
        });
        stage.handle(composite(painted(8, 8, 0.5), Color::rgb(252, 211, 0), false, false, false));
        let [r, g, b] = stage.pixel(2, 2).unwrap();
        assert!(g > r && g > b, "expected green, got {:?}", [r, g, b]);
    }
    #[test]
    fn erase_lifts_towards_color() {
        let surface = surface(8, 8);
        let mut stage = RenderStage::new(surface);
        stage.handle(StageMessage::Clear {
            color: Color::BLACK,
        });
        stage.handle(composite(painted(8, 8, 1.0), Color::WHITE, true, false, false));
        assert_eq!(stage.pixel(2, 2), Some([1.0, 1.0, 1.0]));
        assert_eq!(stage.pixel(6, 6), Some([0.0, 0.0, 0.0]));
    }
    #[test]
    fn images_clip_to_stage() {
        let surface = surface(8, 8);
        let mut stage = RenderStage::new(surface);
        stage.handle(StageMessage::Clear {
            color: Color::WHITE,
        });
        let image = image::RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 0, 255]));
        stage.handle(StageMessage::Composite(Composite {
            paint: Paint::Image { image, x: -2, y: 6 },
            erase: false,
            last: true,
            sublayer: false,
        }));
        assert!(stage.pixel(1, 7).unwrap()[0] < 0.1);
        assert_eq!(stage.pixel(2, 7), Some([1.0, 1.0, 1.0]));
        assert_eq!(stage.pixel(1, 5), Some([1.0, 1.0, 1.0]));
    }
    #[test]
    fn threaded_stage_round_trip() {
        let surface = surface(8, 8);
        let handle = StageHandle::spawn(surface, 2).unwrap();
        handle
            .send(StageMessage::Clear {
                color: Color::rgb(0, 0, 255),
            })
            .unwrap();
        handle.sync().unwrap();
        let image = handle.read().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
    }
}
