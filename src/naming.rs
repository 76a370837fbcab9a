use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Extensions accepted as "this address is a media file".
pub const MEDIA_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "webp", "mp4", "webm", "mov"];

pub const FALLBACK_EXTENSION: &str = ".bin";
pub const DEFAULT_NAME_LEN: usize = 100;
const UNTITLED: &str = "untitled";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-.()\[\]{} ]").expect("valid filename regex"));

/// Output category of a downloaded file, decided by the suggested name's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Gif,
    Video,
    Other,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [MediaKind::Image, MediaKind::Gif, MediaKind::Video, MediaKind::Other];

    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name).extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg" | "jpeg" | "png" | "webp") => MediaKind::Image,
            Some("gif") => MediaKind::Gif,
            Some("mp4" | "webm" | "mov") => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Gif => "gifs",
            MediaKind::Video => "videos",
            MediaKind::Other => "other",
        }
    }
}

/// Turn a post title into something safe to embed in a file name.
pub fn sanitize_filename(text: &str, max_len: usize) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let stripped = DISALLOWED.replace_all(&collapsed, "");
    let cleaned = WHITESPACE.replace_all(&stripped, " ").trim().to_string();

    let cleaned = if cleaned.chars().count() > max_len {
        let mut cut: String = cleaned.chars().take(max_len.saturating_sub(3)).collect();
        cut.push_str("...");
        cut
    } else {
        cleaned
    };
    if cleaned.is_empty() { UNTITLED.to_string() } else { cleaned }
}

/// `.ext` for an allow-listed extension of the address's last path segment, `.bin` otherwise.
pub fn file_extension(address: &str) -> String {
    media_extension(address).map(|ext| format!(".{ext}")).unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

/// Whether the address points directly at a media file.
pub fn is_media_address(address: &str) -> bool {
    media_extension(address).is_some()
}

fn media_extension(address: &str) -> Option<String> {
    let path = match Url::parse(address) {
        Ok(url) => url.path().to_string(),
        // not absolute; drop query/fragment by hand
        Err(_) => address.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let segment = path.rsplit('/').next()?.to_ascii_lowercase();
    let (_, ext) = segment.rsplit_once('.')?;
    MEDIA_EXTENSIONS.contains(&ext).then(|| ext.to_string())
}

pub fn unescape_address(address: &str) -> String {
    address.replace("&amp;", "&")
}
