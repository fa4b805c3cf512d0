//! Image normalization: validate, crop to a fixed aspect, render a fixed-size JPEG.

pub mod codec;
pub mod geometry;
pub mod pipeline;
pub mod preview;
pub mod render;
pub mod validate;

pub use codec::{Base64Codec, BinaryTextCodec};
pub use geometry::{initial_crop, AspectRatio, CropRect, DisplayGeometry, PixelRegion};
pub use pipeline::{CropSession, FileNamer, ImagePipeline, NormalizedImage, DEFAULT_QUALITY};
pub use preview::{BlobUrlFactory, FsBlobUrlFactory, MemoryBlobUrls};
pub use render::{ImageRenderer, RasterRenderer, OUTPUT_MIME};
pub use validate::{validate_source, ImageMime, DEFAULT_MAX_BYTES};
