//! SDP line model
//!
//! Splits an SDP body on `\r\n`, exposes media sections by index range, and
//! joins the lines back with the same terminator. Splitting and joining are
//! exact inverses: a trailing terminator produces a trailing empty line which
//! is kept.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Line terminator used by SDP bodies
pub const LINE_TERMINATOR: &str = "\r\n";

/// Prefix of a media description line
pub const MEDIA_SECTION_PREFIX: &str = "m=";

/// Media kinds the augmenter and the loopback session care about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio media section (`m=audio`)
    Audio,
    /// Video media section (`m=video`)
    Video,
}

impl MediaKind {
    /// Kinds in processing order
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];

    /// The media token as it appears after `m=`
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(Error::InvalidMediaKind(other.to_string())),
        }
    }
}

/// Location of one media section inside an [`SdpLines`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSection {
    /// Media token following `m=` (e.g. `audio`, `application`)
    pub media: String,
    /// Index of the `m=` line
    pub start: usize,
    /// Index one past the last line of the section
    pub end: usize,
}

impl MediaSection {
    /// Indices of the lines after the `m=` line
    pub fn body(&self) -> std::ops::Range<usize> {
        (self.start + 1)..self.end
    }

    /// Number of lines in the section, including the `m=` line
    pub fn line_count(&self) -> usize {
        self.end - self.start
    }

    /// Whether this section describes the given kind
    pub fn is_kind(&self, kind: MediaKind) -> bool {
        self.media == kind.as_str()
    }
}

/// An SDP body held as its sequence of lines
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SdpLines {
    lines: Vec<String>,
}

impl SdpLines {
    /// Split a body on `\r\n`
    pub fn parse(body: &str) -> Self {
        Self {
            lines: body.split(LINE_TERMINATOR).map(str::to_string).collect(),
        }
    }

    /// Number of lines, counting a trailing empty line
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Insert a line so that it ends up at `index`
    ///
    /// Lines at and after `index` shift down by one. An index past the end
    /// appends.
    pub fn insert(&mut self, index: usize, line: impl Into<String>) {
        let index = index.min(self.lines.len());
        self.lines.insert(index, line.into());
    }

    /// First media section of the given kind
    pub fn media_section(&self, kind: MediaKind) -> Option<MediaSection> {
        let start = self
            .lines
            .iter()
            .position(|line| media_token(line) == Some(kind.as_str()))?;

        Some(MediaSection {
            media: kind.as_str().to_string(),
            start,
            end: self.section_end(start),
        })
    }

    /// All media sections in order of appearance
    pub fn media_sections(&self) -> Vec<MediaSection> {
        self.lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| {
                media_token(line).map(|media| MediaSection {
                    media: media.to_string(),
                    start: index,
                    end: self.section_end(index),
                })
            })
            .collect()
    }

    /// Join the lines back into a body with `\r\n`
    pub fn to_body(&self) -> String {
        self.lines.join(LINE_TERMINATOR)
    }

    fn section_end(&self, start: usize) -> usize {
        self.lines
            .iter()
            .enumerate()
            .skip(start + 1)
            .find(|(_, line)| line.starts_with(MEDIA_SECTION_PREFIX))
            .map(|(index, _)| index)
            .unwrap_or(self.lines.len())
    }
}

impl fmt::Display for SdpLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_body())
    }
}

impl From<Vec<String>> for SdpLines {
    fn from(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

/// Media token of an `m=` line, if the line is one
///
/// The token is the run of characters between `m=` and the first space.
/// Callers compare it whole, so `m=audio2` is not an audio section.
fn media_token(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(MEDIA_SECTION_PREFIX)?;
    Some(rest.split(' ').next().unwrap_or(rest))
}
