//! Caption cleaner: turns the indexer's WebVTT output into plain text.
//!
//! The speech indexer writes `<stem>_aud_SpReco.vtt` next to the other job
//! outputs.  [`clean_caption_file`] keeps only the transcript lines of that
//! file and writes them to `<stem>_aud_SpReco.vtt.txt`:
//!
//! ```text
//! WEBVTT                                  WEBVTT
//!                                         Hello and welcome.
//! NOTE Confidence: 0.91                   This is the second cue.
//!
//! 00:00:00.000 --> 00:00:01.480
//! Hello and welcome.
//!
//! NOTE Confidence: 0.87
//!
//! 00:00:01.480 --> 00:00:03.020
//! This is the second cue.
//! ```

use std::path::{Path, PathBuf};

/// Suffix the indexer appends to the input file stem.
pub const CAPTION_SUFFIX: &str = "_aud_SpReco.vtt";

const TIMING_MARKER: &str = "-->";
const CONFIDENCE_PREFIX: &str = "NOTE Confidence:";
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Caption file the indexer produces for `input`.
///
/// ```
/// use std::path::Path;
/// use voice2text::caption::caption_path;
///
/// assert_eq!(
///     caption_path(Path::new("/media/speech.mp4")),
///     Path::new("/media/speech_aud_SpReco.vtt"),
/// );
/// ```
pub fn caption_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = format!("{stem}{CAPTION_SUFFIX}");
    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Transcript written for `caption`: the caption path with `.txt` appended.
pub fn transcript_path(caption: &Path) -> PathBuf {
    let mut name = caption.as_os_str().to_owned();
    name.push(".txt");
    PathBuf::from(name)
}

/// `true` when `line` is transcript text rather than cue timing, blank
/// separator or confidence annotation.
pub fn is_transcript_line(line: &str) -> bool {
    !line.is_empty() && !line.contains(TIMING_MARKER) && !line.starts_with(CONFIDENCE_PREFIX)
}

/// Keep the transcript lines of `content`, in order.  A leading byte-order
/// mark is not part of the text.
pub fn clean_lines(content: &str) -> Vec<&str> {
    content
        .strip_prefix(BYTE_ORDER_MARK)
        .unwrap_or(content)
        .lines()
        .filter(|l| is_transcript_line(l))
        .collect()
}

/// Clean the caption file belonging to `input`.
///
/// Returns the transcript path, or `None` when the caption file does not
/// exist (not every processor emits it).
pub fn clean_caption_file(input: &Path) -> std::io::Result<Option<PathBuf>> {
    let caption = caption_path(input);
    if !caption.is_file() {
        log::debug!("no caption file at {}; nothing to clean", caption.display());
        return Ok(None);
    }

    // Undecodable bytes become U+FFFD; only I/O failures are errors.
    let bytes = std::fs::read(&caption)?;
    let content = String::from_utf8_lossy(&bytes);
    let mut text = String::with_capacity(content.len());
    for line in clean_lines(&content) {
        text.push_str(line);
        text.push('\n');
    }

    let transcript = transcript_path(&caption);
    std::fs::write(&transcript, text)?;
    log::info!("transcript written to {}", transcript.display());
    Ok(Some(transcript))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
