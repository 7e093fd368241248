//! Sprite atlas packing.

mod packer;

pub use packer::TexPacker;
