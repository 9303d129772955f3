//! WebM container core for screen recordings.
//!
//! - [`ebml`]: variable-length integers, element framing and a size-driven
//!   element walker.
//! - [`webm`]: an incremental writer that turns encoded frames into a WebM
//!   file.
//! - [`duration`]: repairs the Duration of a finished file produced by a
//!   recorder that did not know it up front.

pub mod commands;
pub mod duration;
pub mod ebml;
pub mod error;
pub mod naming;
pub mod webm;

pub use duration::{patch_duration, try_patch_duration, PatchKind, PatchedBuffer};
pub use ebml::{decode_var_int, encode_element, encode_var_int, VarInt};
pub use error::{
    ConfigurationError, ContainerStructureError, EncodingOverflowError, Error, Result,
    SequenceError,
};
pub use webm::{AudioConfig, Frame, VideoConfig, WebmWriter, WriterOptions};
