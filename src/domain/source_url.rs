use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern is valid")
});

const WATCH_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

const PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v"];

/// A remote media URL that resolved to a supported video identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUrl {
    video_id: String,
}

impl SourceUrl {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let url = Url::parse(raw.trim()).map_err(|e| format!("malformed url: {}", e))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(format!("unsupported scheme: {}", url.scheme()));
        }
        let host = url
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| "url has no host".to_string())?;

        let candidate = if host == "youtu.be" {
            url.path_segments().and_then(|mut s| s.next()).map(str::to_string)
        } else if WATCH_HOSTS.contains(&host.as_str()) {
            let mut segments = url.path_segments().into_iter().flatten();
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some(prefix) if PATH_PREFIXES.contains(&prefix) => {
                    segments.next().map(str::to_string)
                }
                _ => None,
            }
        } else {
            return Err(format!("unsupported host: {}", host));
        };

        match candidate {
            Some(id) if VIDEO_ID.is_match(&id) => Ok(Self { video_id: id }),
            Some(id) => Err(format!("invalid video id: {}", id)),
            None => Err("url does not reference a video".to_string()),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn canonical(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}
