//! Image processors and the registry that dispatches to them.
//!
//! Each transformation type is implemented by one [`Processor`]. Processors
//! are pure image-to-image functions; loading the input and persisting the
//! artifact is the model manager's job, so every processor can be tested on
//! in-memory images.
//!
//! # Example
//!
//! ```ignore
//! use morphflux_core::processor::ProcessorRegistry;
//!
//! let registry = ProcessorRegistry::with_defaults(&[]);
//! let processor = registry.lookup("style_transfer")?;
//! let styled = processor.run(image, &params)?;
//! ```

mod age_progression;
mod background_removal;
mod background_replacement;
mod error;
mod face;
mod face_enhancement;
mod object_removal;
pub mod ops;
mod params;
mod registry;
mod segmentation;
mod style_transfer;
mod traits;

pub use age_progression::AgeProgressionProcessor;
pub use background_removal::BackgroundRemovalProcessor;
pub use background_replacement::BackgroundReplacementProcessor;
pub use error::{ProcessorError, RegistryError};
pub use face::{FaceDetector, SkinToneFaceDetector};
pub use face_enhancement::FaceEnhancementProcessor;
pub use object_removal::ObjectRemovalProcessor;
pub use ops::Rect;
pub use registry::ProcessorRegistry;
pub use segmentation::segment_foreground;
pub use style_transfer::StyleTransferProcessor;
pub use traits::Processor;
