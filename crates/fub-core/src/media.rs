//! Incoming file description and the naming rules applied to it.

const MAX_STAGING_NAME: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Document,
    Photo,
    Video,
    Audio,
}

impl MediaKind {
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::Document => "document",
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }
}

/// A file attached to a Telegram message, independent of the Bot API types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingFile {
    pub kind: MediaKind,
    pub file_id: String,
    pub unique_id: String,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

impl IncomingFile {
    /// Name shown to the user and sent to the host.
    pub fn display_name(&self) -> String {
        let given = self
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (self.kind, given) {
            (MediaKind::Photo, _) => format!("photo_{}.jpg", self.unique_id),
            (_, Some(name)) => name.to_string(),
            (MediaKind::Document, None) => format!("document_{}", self.unique_id),
            (MediaKind::Video, None) => format!("video_{}.mp4", self.unique_id),
            (MediaKind::Audio, None) => format!("audio_{}.mp3", self.unique_id),
        }
    }

    /// True when the reported size is known to exceed `limit` bytes.
    pub fn exceeds(&self, limit: u64) -> bool {
        self.size.map(|s| s > limit).unwrap_or(false)
    }
}

/// Filesystem-safe name for the staging copy, at most 100 chars, keeping the
/// extension when it has to truncate.
pub fn staging_name(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.chars().count() <= MAX_STAGING_NAME {
        return safe;
    }

    match split_extension(&safe) {
        Some((stem, ext)) => {
            let keep = MAX_STAGING_NAME.saturating_sub(ext.chars().count() + 1);
            let mut out: String = stem.chars().take(keep).collect();
            out.push_str(ext);
            out
        }
        None => safe.chars().take(MAX_STAGING_NAME).collect(),
    }
}

/// Path segment used for hosts that address uploads by name (transfer.sh).
pub fn host_object_name(name: &str, unique_id: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.is_empty() {
        format!("file_{unique_id}")
    } else {
        safe
    }
}

pub fn size_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Split `name` into stem and extension (with the dot). Leading-dot names
/// have no extension.
fn split_extension(name: &str) -> Option<(&str, &str)> {
    let idx = name.rfind('.')?;
    if idx == 0 || idx == name.len() - 1 {
        return None;
    }
    Some((&name[..idx], &name[idx..]))
}
