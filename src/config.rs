//! Compile-time layout constants.
//!
//! These numbers are baked into fixed-size arrays throughout the
//! node/segment/bucket layout: changing one changes the shape of every
//! node in the tree, so they are `const`s rather than fields on a runtime
//! configuration struct.

/// Max leaves a bucket holds before a segment split or child promotion
/// is triggered.
pub const BUCKET_CAPACITY: usize = 16;

/// Bits used for the bucket index: the full routing byte, hence `back_num
/// = 8` and a 256-wide segment.
pub const BACK_NUM_BITS: u32 = 8;

/// Buckets per segment. Indexed by the full routing byte
/// (`key[start_pos] & 0xFF`), hence `2^BACK_NUM_BITS`.
pub const SEGMENT_SIZE: usize = 1 << BACK_NUM_BITS;

/// Maximum local depth a segment can reach, and the log2 of a prefix
/// directory's width.
pub const GLOBAL_DEPTH: u8 = 4;

/// Directory width: `2^GLOBAL_DEPTH` segment-handle slots per directory.
pub const DIRECTORY_WIDTH: usize = 1 << GLOBAL_DEPTH as usize;

/// Maximum shared key-prefix length stored per node.
pub const PREFIX_BYTES: usize = 6;
