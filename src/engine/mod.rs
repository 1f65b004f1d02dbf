//! Audio Engine Module
//!
//! Signal conversion between audio files and the internal mono float format:
//! - Audio buffer type
//! - File decode/encode operations

pub mod buffer;
pub mod io;

pub use buffer::{db_to_linear, linear_to_db, AudioBuffer};
pub use io::{
    decode_bytes, decode_file, decode_file_limited, encode, encode_wav, quantize_i16,
    transcode_in_place, write_audio, AudioFormat,
};
