//! voice2text: speech-to-text through Azure Media Services.
//!
//! Uploads a media file, runs the speech indexer over it, downloads the
//! outputs next to the input and turns the WebVTT captions into a plain
//! transcript.

pub mod ams;
pub mod caption;
pub mod config;
pub mod error;
pub mod keyboard;
pub mod pipeline;

pub use error::{JobExecutionError, Result, Voice2TextError};
