//! # Compositor
//!
//! Draws accumulate into a single [`Mask`]. Consecutive draws in the same color share the mask,
//! and it is only handed to the render stage when the color changes, an image is placed, or the
//! caller marks the end of a layer. This keeps the number of stage messages proportional to color
//! changes instead of draw calls.

use inkbleed_core::{color::Color, mask::Mask};

use crate::error::EngineError;
use crate::stage::{Composite, Paint, StageHandle, StageMessage};

/// Somewhere to send finished composites.
pub trait StageSink {
    /// # Errors
    /// If the receiving end has gone away.
    fn submit(&mut self, message: StageMessage) -> Result<(), EngineError>;
}
impl StageSink for StageHandle {
    fn submit(&mut self, message: StageMessage) -> Result<(), EngineError> {
        self.send(message)
    }
}
/// Collects messages in order, for inspecting what would have been sent.
impl StageSink for Vec<StageMessage> {
    fn submit(&mut self, message: StageMessage) -> Result<(), EngineError> {
        self.push(message);
        Ok(())
    }
}

/// Parameters of one [`Compositor::blend`] call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Blend {
    /// `None` keeps painting with the pending color.
    pub color: Option<Color>,
    pub erase: bool,
    /// Flush now, ending the batch.
    pub last: bool,
    /// The flush is part of a larger layer, and should not be presented yet.
    pub sublayer: bool,
}
impl Blend {
    #[must_use]
    pub fn color(color: Color) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }
    #[must_use]
    pub fn erase(color: Color) -> Self {
        Self {
            color: Some(color),
            erase: true,
            ..Self::default()
        }
    }
    /// End of the frame, flush whatever is pending and present it.
    #[must_use]
    pub fn last() -> Self {
        Self {
            last: true,
            ..Self::default()
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Pending {
    color: Color,
    erase: bool,
}

pub struct Compositor<Sink: StageSink> {
    sink: Sink,
    mask: Mask,
    pending: Option<Pending>,
    batch_open: bool,
}

impl<Sink: StageSink> Compositor<Sink> {
    pub fn new(sink: Sink, width: usize, height: usize) -> Self {
        Self {
            sink,
            mask: Mask::new(width, height),
            pending: None,
            batch_open: false,
        }
    }
    /// The mask the current batch is drawing into.
    pub fn mask(&mut self) -> &mut Mask {
        &mut self.mask
    }
    pub fn sink(&self) -> &Sink {
        &self.sink
    }
    /// Whether draws are being gathered for a flush.
    pub fn is_accumulating(&self) -> bool {
        self.batch_open
    }
    /// Call *before* drawing into [`Self::mask`] with a color, and with [`Blend::last`] once done.
    /// # Errors
    /// If the stage is gone.
    pub fn blend(&mut self, blend: Blend) -> Result<(), EngineError> {
        let next = blend.color.map(|color| Pending {
            color,
            erase: blend.erase,
        });
        match (self.pending, next) {
            (Some(pending), Some(next)) if pending != next && self.batch_open => {
                self.flush(pending, false, false)?;
                self.pending = Some(next);
                self.batch_open = true;
            }
            (_, Some(next)) => {
                self.pending = Some(next);
                self.batch_open = true;
            }
            (None, None) => {
                log::trace!("blend with no color and nothing pending, using black");
                self.pending = Some(Pending {
                    color: Color::BLACK,
                    erase: blend.erase,
                });
                self.batch_open = true;
            }
            (Some(_), None) => self.batch_open = true,
        }
        if blend.last {
            let pending = self.pending.unwrap_or(Pending {
                color: Color::BLACK,
                erase: false,
            });
            self.flush(pending, true, blend.sublayer)?;
            self.batch_open = false;
        }
        Ok(())
    }
    /// Flush any open batch, then place an image above it.
    /// # Errors
    /// If the stage is gone.
    pub fn image(&mut self, image: image::RgbaImage, x: i64, y: i64) -> Result<(), EngineError> {
        self.close_batch()?;
        log::trace!("flushing {}x{} image", image.width(), image.height());
        self.sink.submit(StageMessage::Composite(Composite {
            paint: Paint::Image { image, x, y },
            erase: false,
            last: false,
            sublayer: false,
        }))
    }
    /// Flush any open batch, then fill the whole surface.
    /// # Errors
    /// If the stage is gone.
    pub fn clear(&mut self, color: Color) -> Result<(), EngineError> {
        self.close_batch()?;
        self.sink.submit(StageMessage::Clear { color })
    }
    fn close_batch(&mut self) -> Result<(), EngineError> {
        if let (true, Some(pending)) = (self.batch_open, self.pending) {
            self.flush(pending, false, false)?;
        }
        self.batch_open = false;
        Ok(())
    }
    fn flush(&mut self, pending: Pending, last: bool, sublayer: bool) -> Result<(), EngineError> {
        log::trace!(
            "flush {} (erase: {}, last: {last}, sublayer: {sublayer})",
            pending.color.hex(),
            pending.erase
        );
        let mask = self.mask.take();
        self.sink.submit(StageMessage::Composite(Composite {
            paint: Paint::Mask {
                mask,
                color: pending.color,
            },
            erase: pending.erase,
            last,
            sublayer,
        }))
    }
}

/// Whatever is still open is sent as the end of a frame, ahead of the sink shutting down.
impl<Sink: StageSink> Drop for Compositor<Sink> {
    fn drop(&mut self) {
        if let (true, Some(pending)) = (self.batch_open, self.pending) {
            self.batch_open = false;
            if let Err(e) = self.flush(pending, true, false) {
                log::warn!("open batch lost on drop: {e}");
            }
        }
    }
}

impl Compositor<StageHandle> {
    /// The visible surface, after everything drawn so far has been mixed.
    ///
    /// An open batch is mixed but not presented, end the frame first to see it.
    /// # Errors
    /// If the stage is gone.
    pub fn read(&mut self) -> Result<image::RgbaImage, EngineError> {
        self.close_batch()?;
        self.sink.read()
    }
    /// Block until everything drawn so far has been mixed.
    /// # Errors
    /// If the stage is gone.
    pub fn sync(&mut self) -> Result<(), EngineError> {
        self.close_batch()?;
        self.sink.sync()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use inkbleed_core::Point;

    const A: Color = Color::rgb(200, 30, 30);
    const B: Color = Color::rgb(30, 30, 200);

    fn compositor() -> Compositor<Vec<StageMessage>> {
        Compositor::new(Vec::new(), 16, 16)
    }
    fn draw(compositor: &mut Compositor<Vec<StageMessage>>) {
        compositor.mask().disc(Point::new(8.0, 8.0), 3.0, 0.5);
    }
    /// `(color, erase, last, sublayer)` of every composite sent.
    fn flushes(compositor: &Compositor<Vec<StageMessage>>) -> Vec<(Color, bool, bool, bool)> {
        compositor
            .sink()
            .iter()
            .filter_map(|message| match message {
                StageMessage::Composite(Composite {
                    paint: Paint::Mask { color, .. },
                    erase,
                    last,
                    sublayer,
                }) => Some((*color, *erase, *last, *sublayer)),
                _ => None,
            })
            .collect()
    }
    #[test]
    fn same_color_batches() {
        let mut compositor = compositor();
        for _ in 0..3 {
            compositor.blend(Blend::color(A)).unwrap();
            draw(&mut compositor);
        }
        assert!(compositor.sink().is_empty());
        assert!(compositor.is_accumulating());
        compositor
            .blend(Blend {
                last: true,
                ..Blend::color(B)
            })
            .unwrap();
        assert_eq!(
            flushes(&compositor),
            vec![(A, false, false, false), (B, false, true, false)]
        );
        assert!(!compositor.is_accumulating());
    }
    #[test]
    fn colorless_blend_reuses_pending() {
        let mut compositor = compositor();
        compositor.blend(Blend::color(A)).unwrap();
        draw(&mut compositor);
        compositor.blend(Blend::default()).unwrap();
        draw(&mut compositor);
        compositor.blend(Blend::last()).unwrap();
        assert_eq!(flushes(&compositor), vec![(A, false, true, false)]);
    }
    #[test]
    fn nothing_pending_is_black() {
        let mut compositor = compositor();
        compositor.blend(Blend::last()).unwrap();
        assert_eq!(flushes(&compositor), vec![(Color::BLACK, false, true, false)]);
    }
    #[test]
    fn erase_is_its_own_batch() {
        let mut compositor = compositor();
        compositor.blend(Blend::color(A)).unwrap();
        draw(&mut compositor);
        compositor.blend(Blend::erase(A)).unwrap();
        draw(&mut compositor);
        compositor.blend(Blend::last()).unwrap();
        assert_eq!(
            flushes(&compositor),
            vec![(A, false, false, false), (A, true, true, false)]
        );
    }
    #[test]
    fn sublayers_are_marked() {
        let mut compositor = compositor();
        compositor
            .blend(Blend {
                last: true,
                sublayer: true,
                ..Blend::color(A)
            })
            .unwrap();
        assert_eq!(flushes(&compositor), vec![(A, false, true, true)]);
    }
    #[test]
    fn images_flush_first() {
        let mut compositor = compositor();
        compositor.blend(Blend::color(A)).unwrap();
        draw(&mut compositor);
        compositor
            .image(image::RgbaImage::new(2, 2), 1, 1)
            .unwrap();
        let sent = compositor.sink();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[0],
            StageMessage::Composite(Composite {
                paint: Paint::Mask { .. },
                ..
            })
        ));
        assert!(matches!(
            &sent[1],
            StageMessage::Composite(Composite {
                paint: Paint::Image { x: 1, y: 1, .. },
                ..
            })
        ));
        // The mask moved to the stage.
        assert!(compositor.mask().is_empty());
    }
    #[test]
    fn transitions_flush_without_draws() {
        let mut compositor = compositor();
        for _ in 0..3 {
            compositor.blend(Blend::color(A)).unwrap();
        }
        assert!(compositor.sink().is_empty());
        compositor
            .blend(Blend {
                last: true,
                ..Blend::color(B)
            })
            .unwrap();
        assert_eq!(
            flushes(&compositor),
            vec![(A, false, false, false), (B, false, true, false)]
        );
    }
    #[test]
    fn dropping_sends_the_open_batch() {
        let surface = crate::studio::surface(16, 16);
        let handle = StageHandle::spawn(surface.clone(), 4).unwrap();
        let mut compositor = Compositor::new(handle, 16, 16);
        compositor.clear(Color::WHITE).unwrap();
        compositor.blend(Blend::color(Color::BLACK)).unwrap();
        compositor.mask().disc(Point::new(8.0, 8.0), 4.0, 1.0);
        // Joins the stage once the queue has drained.
        drop(compositor);
        let pixel = surface.lock().get_pixel(8, 8).0;
        assert!(pixel[0] < 128, "{pixel:?}");
    }
}
