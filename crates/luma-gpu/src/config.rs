//! Converter configuration.
//!
//! ```ignore
//! use luma_gpu::{ConverterConfig, TileSize};
//!
//! let config = ConverterConfig::default()
//!     .tile("8x32".parse()?)
//!     .device_index(Some(1))
//!     .timeout(Some(Duration::from_secs(5)));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::{DeviceError, DeviceResult};

/// Default work-group edge length.
pub const DEFAULT_TILE: u32 = 16;

/// Work-group (local extent) dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSize {
    pub x: u32,
    pub y: u32,
}

impl TileSize {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Square tile.
    pub const fn square(edge: u32) -> Self {
        Self::new(edge, edge)
    }

    /// Work-items per group.
    pub fn invocations(&self) -> u32 {
        self.x.saturating_mul(self.y)
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::square(DEFAULT_TILE)
    }
}

impl fmt::Display for TileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

/// Parses `"16"` (square) or `"16x8"` / `"16X8"`.
impl FromStr for TileSize {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| DeviceError::InvalidConfig(format!("invalid tile size: {s:?}")))
        };

        let tile = match s.split_once(['x', 'X']) {
            Some((x, y)) => TileSize::new(parse(x)?, parse(y)?),
            None => TileSize::square(parse(s)?),
        };
        if tile.x == 0 || tile.y == 0 {
            return Err(DeviceError::InvalidConfig(format!(
                "tile size must be non-zero, got {tile}"
            )));
        }
        Ok(tile)
    }
}

/// Settings shared by device selection, kernel build and retrieval.
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Local work-group size.
    pub tile: TileSize,
    /// Force a specific device by enumeration index.
    pub device_index: Option<usize>,
    /// Accept a non-GPU device when no GPU is present.
    pub allow_fallback: bool,
    /// Upper bound on waiting for one image's result (None = wait forever).
    pub timeout: Option<Duration>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            tile: TileSize::default(),
            device_index: None,
            allow_fallback: true,
            timeout: None,
        }
    }
}

impl ConverterConfig {
    /// Set work-group size.
    pub fn tile(mut self, tile: TileSize) -> Self {
        self.tile = tile;
        self
    }

    /// Set device override.
    pub fn device_index(mut self, index: Option<usize>) -> Self {
        self.device_index = index;
        self
    }

    /// Allow or forbid non-GPU fallback.
    pub fn allow_fallback(mut self, allow: bool) -> Self {
        self.allow_fallback = allow;
        self
    }

    /// Set readback timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks values that do not depend on the device.
    pub fn validate(&self) -> DeviceResult<()> {
        if self.tile.x == 0 || self.tile.y == 0 {
            return Err(DeviceError::InvalidConfig(format!(
                "tile size must be non-zero, got {}",
                self.tile
            )));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(DeviceError::InvalidConfig("timeout must be positive".into()));
        }
        Ok(())
    }
}
