pub mod atom;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod handler;
pub mod nal;
pub mod sample_entry;
pub mod utils;

#[cfg(test)]
mod tests;

pub use atom::{AtomBuffer, AtomWriter};
pub use config::MuxConfig;
pub use error::{MuxError, Result};
pub use format::{FormatBlock, FourCc, MajorType, MediaFormat, Subtype};
pub use handler::{can_support, make, make_with_config, Handler, HandlerKind, MediaSample};
