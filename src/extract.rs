use crate::naming::{file_extension, is_media_address, sanitize_filename, unescape_address, DEFAULT_NAME_LEN};
use crate::types::Post;

/// Sibling file Reddit serves the audio track under for DASH videos. Not guaranteed to exist.
pub const COMPANION_AUDIO_FILE: &str = "DASH_audio.mp4";
const GIFV_SUFFIX: &str = ".gifv";

/// A resolved source address and the file name it should be saved as.
/// Two references are the same download when their addresses are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub url: String,
    pub file_name: String,
}

impl MediaRef {
    fn new(url: &str, file_name: String) -> Self {
        Self { url: unescape_address(url), file_name }
    }
}

/// Every retrievable asset of a post, highest resolution first.
///
/// A direct media link is taken as canonical and short-circuits everything else.
/// Otherwise gallery items, hosted video (plus its guessed audio track), the first
/// preview rendition and `.gifv` links are all collected.
pub fn extract_media(post: &Post) -> Vec<MediaRef> {
    let stem = format!("{}_{}", post.post_id(), sanitize_filename(post.title(), DEFAULT_NAME_LEN));
    let direct = post.direct_url();

    if let Some(url) = direct.filter(|u| is_media_address(u)) {
        return vec![MediaRef::new(url, format!("{stem}{}", file_extension(url)))];
    }

    let mut out = Vec::new();
    gallery_refs(post, &stem, &mut out);
    video_refs(post, &stem, &mut out);
    preview_ref(post, &stem, &mut out);

    if let Some(url) = direct.and_then(|u| u.strip_suffix(GIFV_SUFFIX)) {
        out.push(MediaRef::new(&format!("{url}.mp4"), format!("{stem}.mp4")));
    }
    out
}

fn gallery_refs(post: &Post, stem: &str, out: &mut Vec<MediaRef>) {
    if !post.is_gallery() || post.media_metadata.is_none() { return; }
    for (i, media_id) in post.gallery_items().enumerate() {
        let Some(url) = media_id.and_then(|id| post.gallery_metadata(id)).and_then(|m| m.best_url()) else { continue };
        let url = unescape_address(url);
        let name = format!("{stem}_{}{}", i + 1, file_extension(&url));
        out.push(MediaRef { url, file_name: name });
    }
}

fn video_refs(post: &Post, stem: &str, out: &mut Vec<MediaRef>) {
    if !post.has_video_hint() { return; }
    let Some(video_url) = post.video_fallback_url() else { return };
    let video = MediaRef::new(video_url, format!("{stem}_video.mp4"));
    let audio_url = match video.url.rsplit_once('/') {
        Some((base, _)) => format!("{base}/{COMPANION_AUDIO_FILE}"),
        None => COMPANION_AUDIO_FILE.to_string(),
    };
    out.push(video);
    out.push(MediaRef { url: audio_url, file_name: format!("{stem}_audio.mp4") });
}

fn preview_ref(post: &Post, stem: &str, out: &mut Vec<MediaRef>) {
    let Some(image) = post.first_preview() else { return };
    if let Some(url) = image.gif_url() {
        out.push(MediaRef::new(url, format!("{stem}_preview.gif")));
    } else if let Some(url) = image.mp4_url() {
        out.push(MediaRef::new(url, format!("{stem}_preview.mp4")));
    } else if let Some(url) = image.source_url() {
        let url = unescape_address(url);
        let name = format!("{stem}_preview{}", file_extension(&url));
        out.push(MediaRef { url, file_name: name });
    }
}
