//! Engine settings, saved and loaded from user preferences.

const DOCUMENTATION: &str = r#"# Inkbleed engine settings. You may edit this file, but be aware that formatting and comments
# will not be preserved. Missing keys fall back to their defaults.

# width, height:     canvas size in pixels.
# seed:              random seed, the same seed redraws the same artwork.
# queue_capacity:    draw operations buffered for the render stage before drawing blocks.
# frame_rate:        frames per second for looping sketches.
# field_resolution:  flow field cell size as a fraction of the canvas width.
# default_field:     flow field activated on new canvases, or empty for none.
# brush_scale:       multiplier applied to every brush on startup.

"#;

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
    pub queue_capacity: usize,
    pub frame_rate: f32,
    pub field_resolution: f32,
    pub default_field: String,
    pub brush_scale: f32,
}
impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            seed: 0,
            queue_capacity: 64,
            frame_rate: 30.0,
            field_resolution: inkbleed_core::field::DEFAULT_RESOLUTION,
            default_field: String::new(),
            brush_scale: 1.0,
        }
    }
}
impl EngineConfig {
    const FILENAME: &'static str = "inkbleed.toml";
    /// Shared global settings, loaded from user preferences.
    /// (Or defaulted, if unavailable for some reason)
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_CONFIG: std::sync::OnceLock<EngineConfig> = std::sync::OnceLock::new();

        GLOBAL_CONFIG.get_or_init(|| match preferences_dir() {
            None => {
                log::warn!("Preferences dir unavailable, using default settings.");
                Self::default()
            }
            Some(mut dir) => {
                dir.push(Self::FILENAME);
                Self::load_or_default(&dir)
            }
        })
    }
    #[must_use]
    pub fn load_or_default(path: &std::path::Path) -> Self {
        let config: anyhow::Result<Self> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&string)?;
            Ok(config)
        };
        match config {
            Ok(config) => config.sanitized(),
            Err(e) => {
                log::warn!("Failed to load settings from {path:?}, defaulting: {e}");
                Self::default()
            }
        }
    }
    /// Replace unusable values with their defaults.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let default = Self::default();
        let positive = |v: f32, fallback: f32| if v > 0.0 && v.is_finite() { v } else { fallback };
        Self {
            width: if self.width == 0 { default.width } else { self.width },
            height: if self.height == 0 {
                default.height
            } else {
                self.height
            },
            queue_capacity: if self.queue_capacity == 0 {
                default.queue_capacity
            } else {
                self.queue_capacity
            },
            frame_rate: positive(self.frame_rate, default.frame_rate),
            field_resolution: positive(self.field_resolution, default.field_resolution),
            brush_scale: positive(self.brush_scale, default.brush_scale),
            ..self
        }
    }
    /// Write to the preferences dir, prefixed with a description of each key.
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Not recursive. If the parent is missing, the user probably has a good reason.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        self.save_to(&preferences)
    }
    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let string = DOCUMENTATION.to_owned() + &toml::ser::to_string_pretty(self)?;
        std::fs::write(path, string)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn partial_file_uses_defaults() {
        let config: EngineConfig = toml::from_str("seed = 7\nwidth = 300").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.width, 300);
        assert_eq!(config.queue_capacity, 64);
    }
    #[test]
    fn sanitizing() {
        let config = EngineConfig {
            width: 0,
            queue_capacity: 0,
            frame_rate: f32::NAN,
            brush_scale: -1.0,
            ..EngineConfig::default()
        }
        .sanitized();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config, EngineConfig::default());
    }
    #[test]
    fn save_and_reload() {
        let path = std::env::temp_dir().join(format!("inkbleed-test-{}.toml", std::process::id()));
        let config = EngineConfig {
            seed: 42,
            default_field: "seabed".to_owned(),
            ..EngineConfig::default()
        };
        config.save_to(&path).unwrap();
        let loaded = EngineConfig::load_or_default(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
    #[test]
    fn missing_file_defaults() {
        let path = std::path::Path::new("/nonexistent/inkbleed/settings.toml");
        assert_eq!(EngineConfig::load_or_default(path), EngineConfig::default());
    }
}
