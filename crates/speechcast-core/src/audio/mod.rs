//! Audio framing and transcoding utilities

mod transcode;
pub mod wav;

pub use transcode::{TargetFormat, Transcoder};
pub use wav::{
    build_header, build_header_with, strip_header, wrap_pcm, write_wav_file, HeaderBuffer,
    PcmSpec, HEADER_LEN,
};
