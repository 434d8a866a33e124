//! # Tessera Core
//!
//! Shared error type, level presets and codec traits for the tessera
//! compression crates.
//!
//! ## Core Traits
//!
//! - [`Compressor`] - One-shot compression into a caller-sized buffer
//! - [`Decompressor`] - One-shot decompression into a caller-sized buffer
//! - [`Codec`] - Combined compress/decompress capability
//!
//! ## Example
//!
//! ```ignore
//! use tessera_core::{Codec, CompressionLevel};
//! use tessera_zstd::ZstdCodec;
//!
//! let codec = ZstdCodec::with_level(CompressionLevel::Fast);
//! let compressed = codec.compress(data)?;
//! let original = codec.decompress(&compressed)?;
//! ```

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{Codec, Compressor, Decompressor};
pub use types::{CompressionLevel, CompressionRatio, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL};
