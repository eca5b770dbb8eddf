//! Audio Engine Module
//!
//! Core audio handling shared by every analysis stage:
//! - Mono buffer management
//! - Decoding, resampling and normalization
//! - WAV export

pub mod buffer;
pub mod io;

pub use buffer::{AudioBuffer, SeparatedAudio};
pub use io::{export_wav, AudioFormat, Loader};
