//! The set of loaded canvases and the brushes they share.

use std::sync::Arc;

use inkbleed_core::{BrushDescriptor, BrushRegistry};

use crate::canvas::Canvas;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::stage::Surface;

/// Caller-chosen name of a canvas.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanvasId(pub u32);
impl std::fmt::Display for CanvasId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A fresh, transparent surface.
#[must_use]
pub fn surface(width: u32, height: u32) -> Surface {
    Arc::new(parking_lot::Mutex::new(image::RgbaImage::new(width, height)))
}

pub struct Studio {
    config: EngineConfig,
    brushes: Arc<parking_lot::RwLock<BrushRegistry>>,
    canvases: hashbrown::HashMap<CanvasId, Canvas>,
}

impl Studio {
    /// The standard brushes, scaled by the configured brush scale.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let mut brushes = BrushRegistry::with_defaults();
        if (config.brush_scale - 1.0).abs() > f32::EPSILON {
            brushes.scale_all(config.brush_scale);
        }
        Self {
            config,
            brushes: Arc::new(parking_lot::RwLock::new(brushes)),
            canvases: hashbrown::HashMap::new(),
        }
    }
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
    /// Register a surface to draw on. Loading an id again replaces its canvas, shutting the old
    /// one's render stage down once it has drained.
    pub fn load(&mut self, id: CanvasId, surface: Surface) -> &mut Canvas {
        let canvas = Canvas::new(surface, Arc::clone(&self.brushes), &self.config);
        log::debug!("loaded canvas {id}, {}x{}", canvas.width(), canvas.height());
        match self.canvases.entry(id) {
            hashbrown::hash_map::Entry::Occupied(mut entry) => {
                log::warn!("canvas {id} reloaded");
                entry.insert(canvas);
                entry.into_mut()
            }
            hashbrown::hash_map::Entry::Vacant(entry) => entry.insert(canvas),
        }
    }
    /// # Errors
    /// [`EngineError::NotReady`] if `id` was never loaded.
    pub fn canvas(&mut self, id: CanvasId) -> Result<&mut Canvas, EngineError> {
        self.canvases.get_mut(&id).ok_or(EngineError::NotReady(id))
    }
    /// Drop a canvas, waiting for its queued draws to finish.
    pub fn unload(&mut self, id: CanvasId) -> Option<Canvas> {
        self.canvases.remove(&id)
    }
    #[must_use]
    pub fn is_loaded(&self, id: CanvasId) -> bool {
        self.canvases.contains_key(&id)
    }
    /// Shared with every canvas, changes apply to the next stroke.
    #[must_use]
    pub fn brushes(&self) -> Arc<parking_lot::RwLock<BrushRegistry>> {
        Arc::clone(&self.brushes)
    }
    /// # Errors
    /// If the descriptor is invalid.
    pub fn add_brush(&self, name: &str, brush: BrushDescriptor) -> Result<(), EngineError> {
        self.brushes.write().add(name, brush)?;
        Ok(())
    }
}
