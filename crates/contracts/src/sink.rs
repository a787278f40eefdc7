//! SinkDescriptor - where streamed receive data lands

use std::fmt;
use std::path::PathBuf;

/// Placeholders accepted in a per-channel file template.
const CHANNEL_PLACEHOLDERS: [&str; 2] = ["%d", "{ch}"];

/// Destination for the next sample stream of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SinkDescriptor {
    /// Accumulate in memory until fetched
    #[default]
    MemoryBuffer,
    /// Write to one file, optionally with a `raw:`/`ascii:` driver prefix
    File(PathBuf),
    /// One file per USBL channel, e.g. `out/u%d-node.raw`
    ChannelFileTemplate(String),
}

impl SinkDescriptor {
    /// Classify a user-supplied path: a channel placeholder makes it a template.
    pub fn parse(path: &str) -> Self {
        if CHANNEL_PLACEHOLDERS.iter().any(|p| path.contains(p)) {
            SinkDescriptor::ChannelFileTemplate(path.to_string())
        } else {
            SinkDescriptor::File(PathBuf::from(path))
        }
    }

    /// Expand a template for one channel. Non-template descriptors are returned as-is.
    pub fn for_channel(&self, channel: u8) -> Self {
        match self {
            SinkDescriptor::ChannelFileTemplate(pattern) => {
                let ch = channel.to_string();
                let path = CHANNEL_PLACEHOLDERS
                    .iter()
                    .fold(pattern.clone(), |acc, p| acc.replace(p, &ch));
                SinkDescriptor::File(PathBuf::from(path))
            }
            other => other.clone(),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, SinkDescriptor::MemoryBuffer)
    }
}

impl fmt::Display for SinkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkDescriptor::MemoryBuffer => f.write_str("membuf"),
            SinkDescriptor::File(path) => write!(f, "file:{}", path.display()),
            SinkDescriptor::ChannelFileTemplate(p) => write!(f, "template:{}", p),
        }
    }
}
