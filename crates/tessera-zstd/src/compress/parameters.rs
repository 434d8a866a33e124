//! Compression parameters per level and input size.
//!
//! Rows follow the reference zstd grid: four tables keyed by the input size
//! class (unknown or above 256 KiB, up to 256 KiB, up to 128 KiB, up to
//! 16 KiB), each indexed by level 0..=22. Row 0 is the base for negative
//! levels.

use crate::bits::highest_bit;
use crate::frame::MIN_WINDOW_LOG;

use Strategy::*;

/// Largest window log the encoder uses (8 MiB windows).
pub const MAX_WINDOW_LOG: u32 = 23;

/// Level used when 0 is requested.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Highest level with its own row.
pub const MAX_COMPRESSION_LEVEL: i32 = 22;

const MIN_HASH_LOG: u32 = 6;

/// Match search strategy, ordered from fastest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Strategy {
    Fast,
    DFast,
    Greedy,
    Lazy,
    Lazy2,
    BtLazy2,
    BtOpt,
    BtUltra,
}

impl Strategy {
    /// Position in the fastest-to-strongest order.
    pub fn ordinal(self) -> u32 {
        self as u32
    }
}

/// Tuning knobs for one compression call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionParameters {
    pub window_log: u32,
    pub chain_log: u32,
    pub hash_log: u32,
    pub search_log: u32,
    /// Shortest match the finder looks for.
    pub search_length: u32,
    /// For [`Strategy::Fast`], a non-zero value stores literals raw.
    pub target_length: u32,
    pub strategy: Strategy,
}

impl CompressionParameters {
    const fn row(
        window_log: u32,
        chain_log: u32,
        hash_log: u32,
        search_log: u32,
        search_length: u32,
        target_length: u32,
        strategy: Strategy,
    ) -> Self {
        Self {
            window_log,
            chain_log,
            hash_log,
            search_log,
            search_length,
            target_length,
            strategy,
        }
    }

    /// Parameters for `level` and an input of `input_size` bytes (0 when
    /// unknown).
    pub fn compute(level: i32, input_size: usize) -> Self {
        let mut parameters = Self::defaults(level, input_size);

        if level < 0 {
            parameters.target_length = level.unsigned_abs();
        }

        // Small inputs do not need a large window
        if input_size < 1 << (MAX_WINDOW_LOG - 1) {
            let input_log = if input_size < 1 << MIN_HASH_LOG {
                MIN_HASH_LOG
            } else {
                highest_bit((input_size - 1) as u32) + 1
            };
            parameters.window_log = parameters.window_log.min(input_log);
        }
        parameters.window_log = parameters.window_log.clamp(MIN_WINDOW_LOG, MAX_WINDOW_LOG);

        parameters.hash_log = parameters.hash_log.min(parameters.window_log + 1);

        let cycle_log = match parameters.strategy {
            Strategy::BtLazy2 | Strategy::BtOpt | Strategy::BtUltra => parameters.chain_log - 1,
            _ => parameters.chain_log,
        };
        if cycle_log > parameters.window_log {
            parameters.chain_log -= cycle_log - parameters.window_log;
        }

        parameters
    }

    fn defaults(level: i32, input_size: usize) -> Self {
        let table = match input_size {
            0 => 0,
            1..=16_384 => 3,
            16_385..=131_072 => 2,
            131_073..=262_144 => 1,
            _ => 0,
        };
        let row = match level {
            0 => DEFAULT_COMPRESSION_LEVEL,
            level => level.clamp(0, MAX_COMPRESSION_LEVEL),
        };
        DEFAULT_PARAMETERS[table][row as usize]
    }

    /// Window size in bytes.
    pub fn window_size(&self) -> usize {
        1 << self.window_log
    }
}

#[rustfmt::skip]
static DEFAULT_PARAMETERS: [[CompressionParameters; 23]; 4] = [
    // Unknown or large inputs
    [
        CompressionParameters::row(19, 12, 13, 1, 6, 1, Fast),      // base for negative levels
        CompressionParameters::row(19, 13, 14, 1, 7, 0, Fast),      // level 1
        CompressionParameters::row(19, 15, 16, 1, 6, 0, Fast),      // level 2
        CompressionParameters::row(20, 16, 17, 1, 5, 1, DFast),     // level 3
        CompressionParameters::row(20, 18, 18, 1, 5, 1, DFast),     // level 4
        CompressionParameters::row(20, 18, 18, 2, 5, 2, Greedy),    // level 5
        CompressionParameters::row(21, 18, 19, 2, 5, 4, Lazy),      // level 6
        CompressionParameters::row(21, 18, 19, 3, 5, 8, Lazy2),     // level 7
        CompressionParameters::row(21, 19, 19, 3, 5, 16, Lazy2),    // level 8
        CompressionParameters::row(21, 19, 20, 4, 5, 16, Lazy2),    // level 9
        CompressionParameters::row(21, 20, 21, 4, 5, 16, Lazy2),    // level 10
        CompressionParameters::row(21, 21, 22, 4, 5, 16, Lazy2),    // level 11
        CompressionParameters::row(22, 20, 22, 5, 5, 16, Lazy2),    // level 12
        CompressionParameters::row(22, 21, 22, 4, 5, 32, BtLazy2),  // level 13
        CompressionParameters::row(22, 21, 22, 5, 5, 32, BtLazy2),  // level 14
        CompressionParameters::row(22, 22, 22, 6, 5, 32, BtLazy2),  // level 15
        CompressionParameters::row(22, 21, 22, 4, 5, 48, BtOpt),    // level 16
        CompressionParameters::row(23, 22, 22, 4, 4, 64, BtOpt),    // level 17
        CompressionParameters::row(23, 23, 22, 6, 3, 256, BtOpt),   // level 18
        CompressionParameters::row(23, 23, 22, 7, 3, 256, BtUltra), // level 19
        CompressionParameters::row(25, 25, 23, 7, 3, 256, BtUltra), // level 20
        CompressionParameters::row(26, 26, 24, 7, 3, 512, BtUltra), // level 21
        CompressionParameters::row(27, 27, 25, 9, 3, 999, BtUltra), // level 22
    ],
    // Up to 256 KiB
    [
        CompressionParameters::row(18, 12, 13, 1, 5, 1, Fast),
        CompressionParameters::row(18, 13, 14, 1, 6, 0, Fast),
        CompressionParameters::row(18, 14, 14, 1, 5, 1, DFast),
        CompressionParameters::row(18, 16, 16, 1, 4, 1, DFast),
        CompressionParameters::row(18, 16, 17, 2, 5, 2, Greedy),
        CompressionParameters::row(18, 18, 18, 3, 5, 2, Greedy),
        CompressionParameters::row(18, 18, 19, 3, 5, 4, Lazy),
        CompressionParameters::row(18, 18, 19, 4, 4, 4, Lazy),
        CompressionParameters::row(18, 18, 19, 4, 4, 8, Lazy2),
        CompressionParameters::row(18, 18, 19, 5, 4, 8, Lazy2),
        CompressionParameters::row(18, 18, 19, 6, 4, 8, Lazy2),
        CompressionParameters::row(18, 18, 19, 5, 4, 16, BtLazy2),
        CompressionParameters::row(18, 19, 19, 6, 4, 16, BtLazy2),
        CompressionParameters::row(18, 19, 19, 8, 4, 16, BtLazy2),
        CompressionParameters::row(18, 18, 19, 4, 4, 24, BtOpt),
        CompressionParameters::row(18, 18, 19, 4, 3, 24, BtOpt),
        CompressionParameters::row(18, 19, 19, 6, 3, 64, BtOpt),
        CompressionParameters::row(18, 19, 19, 8, 3, 128, BtOpt),
        CompressionParameters::row(18, 19, 19, 10, 3, 256, BtOpt),
        CompressionParameters::row(18, 19, 19, 10, 3, 256, BtUltra),
        CompressionParameters::row(18, 19, 19, 11, 3, 512, BtUltra),
        CompressionParameters::row(18, 19, 19, 12, 3, 512, BtUltra),
        CompressionParameters::row(18, 19, 19, 13, 3, 999, BtUltra),
    ],
    // Up to 128 KiB
    [
        CompressionParameters::row(17, 12, 12, 1, 5, 1, Fast),
        CompressionParameters::row(17, 12, 13, 1, 6, 0, Fast),
        CompressionParameters::row(17, 13, 15, 1, 5, 0, Fast),
        CompressionParameters::row(17, 15, 16, 2, 5, 1, DFast),
        CompressionParameters::row(17, 17, 17, 2, 4, 1, DFast),
        CompressionParameters::row(17, 16, 17, 3, 4, 2, Greedy),
        CompressionParameters::row(17, 17, 17, 3, 4, 4, Lazy),
        CompressionParameters::row(17, 17, 17, 3, 4, 8, Lazy2),
        CompressionParameters::row(17, 17, 17, 4, 4, 8, Lazy2),
        CompressionParameters::row(17, 17, 17, 5, 4, 8, Lazy2),
        CompressionParameters::row(17, 17, 17, 6, 4, 8, Lazy2),
        CompressionParameters::row(17, 17, 17, 7, 4, 8, Lazy2),
        CompressionParameters::row(17, 18, 17, 6, 4, 16, BtLazy2),
        CompressionParameters::row(17, 18, 17, 8, 4, 16, BtLazy2),
        CompressionParameters::row(17, 18, 17, 4, 4, 32, BtOpt),
        CompressionParameters::row(17, 18, 17, 6, 3, 64, BtOpt),
        CompressionParameters::row(17, 18, 17, 7, 3, 128, BtOpt),
        CompressionParameters::row(17, 18, 17, 7, 3, 256, BtOpt),
        CompressionParameters::row(17, 18, 17, 8, 3, 256, BtOpt),
        CompressionParameters::row(17, 18, 17, 8, 3, 256, BtUltra),
        CompressionParameters::row(17, 18, 17, 9, 3, 256, BtUltra),
        CompressionParameters::row(17, 18, 17, 10, 3, 256, BtUltra),
        CompressionParameters::row(17, 18, 17, 11, 3, 512, BtUltra),
    ],
    // Up to 16 KiB
    [
        CompressionParameters::row(14, 12, 13, 1, 5, 1, Fast),
        CompressionParameters::row(14, 14, 15, 1, 5, 0, Fast),
        CompressionParameters::row(14, 14, 15, 1, 4, 0, Fast),
        CompressionParameters::row(14, 14, 14, 2, 4, 1, DFast),
        CompressionParameters::row(14, 14, 14, 4, 4, 2, Greedy),
        CompressionParameters::row(14, 14, 14, 3, 4, 4, Lazy),
        CompressionParameters::row(14, 14, 14, 4, 4, 8, Lazy2),
        CompressionParameters::row(14, 14, 14, 6, 4, 8, Lazy2),
        CompressionParameters::row(14, 14, 14, 8, 4, 8, Lazy2),
        CompressionParameters::row(14, 15, 14, 5, 4, 8, BtLazy2),
        CompressionParameters::row(14, 15, 14, 9, 4, 8, BtLazy2),
        CompressionParameters::row(14, 15, 14, 3, 4, 12, BtOpt),
        CompressionParameters::row(14, 15, 14, 6, 3, 16, BtOpt),
        CompressionParameters::row(14, 15, 14, 6, 3, 24, BtOpt),
        CompressionParameters::row(14, 15, 15, 6, 3, 48, BtOpt),
        CompressionParameters::row(14, 15, 15, 6, 3, 64, BtOpt),
        CompressionParameters::row(14, 15, 15, 6, 3, 96, BtOpt),
        CompressionParameters::row(14, 15, 15, 6, 3, 128, BtOpt),
        CompressionParameters::row(14, 15, 15, 8, 3, 256, BtOpt),
        CompressionParameters::row(14, 15, 15, 6, 3, 256, BtUltra),
        CompressionParameters::row(14, 15, 15, 8, 3, 256, BtUltra),
        CompressionParameters::row(14, 15, 15, 9, 3, 256, BtUltra),
        CompressionParameters::row(14, 15, 15, 10, 3, 512, BtUltra),
    ],
];
