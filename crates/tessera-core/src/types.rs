//! Core type definitions for compression operations.

/// Lowest numeric level accepted by [`CompressionLevel::Custom`].
///
/// Negative levels trade ratio for speed; `-n` means "accelerate by n".
pub const MIN_LEVEL: i32 = -131_072;

/// Highest numeric level.
pub const MAX_LEVEL: i32 = 22;

/// Level used when nothing else is requested.
pub const DEFAULT_LEVEL: i32 = 3;

/// Compression level presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompressionLevel {
    /// Optimized for speed over ratio (level 1).
    Fast,

    /// Balanced speed and ratio (level 3, default).
    #[default]
    Default,

    /// Optimized for ratio over speed (level 9).
    Best,

    /// Maximum ratio the codec offers (level 19).
    Ultra,

    /// Explicit numeric level in `[MIN_LEVEL, MAX_LEVEL]`.
    Custom(i32),
}

impl CompressionLevel {
    /// Convert to numeric level for algorithms.
    pub fn to_level(self) -> i32 {
        match self {
            CompressionLevel::Fast => 1,
            CompressionLevel::Default => DEFAULT_LEVEL,
            CompressionLevel::Best => 9,
            CompressionLevel::Ultra => 19,
            CompressionLevel::Custom(level) => level,
        }
    }

    /// Create from numeric level.
    pub fn from_level(level: i32) -> Self {
        match level {
            1 => CompressionLevel::Fast,
            DEFAULT_LEVEL => CompressionLevel::Default,
            9 => CompressionLevel::Best,
            19 => CompressionLevel::Ultra,
            _ => CompressionLevel::Custom(level),
        }
    }

    /// Check that the numeric level lies in the supported range.
    pub fn validate(self) -> crate::Result<i32> {
        let level = self.to_level();
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(crate::Error::InvalidLevel {
                level,
                min: MIN_LEVEL,
                max: MAX_LEVEL,
            });
        }
        Ok(level)
    }
}

/// Compression ratio metrics.
#[derive(Debug, Clone, Copy)]
pub struct CompressionRatio {
    /// Original uncompressed size in bytes.
    pub original_size: usize,
    /// Compressed size in bytes.
    pub compressed_size: usize,
}

impl CompressionRatio {
    /// Create new ratio from sizes.
    pub fn new(original: usize, compressed: usize) -> Self {
        CompressionRatio {
            original_size: original,
            compressed_size: compressed,
        }
    }

    /// Calculate ratio (original / compressed).
    /// Higher is better (more compression).
    pub fn ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }

    /// Calculate space savings as percentage (0-100).
    pub fn savings_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - (self.compressed_size as f64 / self.original_size as f64)) * 100.0
    }

    /// Check if compression was effective (saved space).
    pub fn is_effective(&self) -> bool {
        self.compressed_size < self.original_size
    }
}
