use std::collections::HashMap;

use serde::Deserialize;

/// One saved post. Every field is optional; Reddit omits or nulls most of them depending on post type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Post {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url_overridden_by_dest: Option<String>,
    pub is_gallery: Option<bool>,
    pub gallery_data: Option<GalleryData>,
    pub media_metadata: Option<HashMap<String, MediaMetadata>>,
    pub is_video: Option<bool>,
    pub media: Option<SecureMedia>,
    pub secure_media: Option<SecureMedia>,
    pub preview: Option<Preview>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryData {
    pub items: Option<Vec<GalleryItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GalleryItem {
    pub media_id: Option<String>,
}

/// Per-item gallery metadata. `s` is the full-size source rendition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaMetadata {
    pub s: Option<MetadataSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataSource {
    pub u: Option<String>,
    pub gif: Option<String>,
    pub mp4: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecureMedia {
    pub reddit_video: Option<RedditVideo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditVideo {
    pub fallback_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Preview {
    pub images: Option<Vec<PreviewImage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewImage {
    pub source: Option<ImageSource>,
    pub variants: Option<PreviewVariants>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewVariants {
    pub gif: Option<PreviewVariant>,
    pub mp4: Option<PreviewVariant>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewVariant {
    pub source: Option<ImageSource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageSource {
    pub url: Option<String>,
}

impl Post {
    pub fn post_id(&self) -> &str { self.id.as_deref().unwrap_or("unknown") }
    pub fn title(&self) -> &str { self.title.as_deref().unwrap_or("") }
    pub fn direct_url(&self) -> Option<&str> { self.url_overridden_by_dest.as_deref() }
    pub fn is_gallery(&self) -> bool { self.is_gallery.unwrap_or(false) }
    pub fn is_video(&self) -> bool { self.is_video.unwrap_or(false) }

    /// Either media attribute counts as a video hint, even without `is_video`.
    pub fn has_video_hint(&self) -> bool {
        self.is_video() || self.media.is_some() || self.secure_media.is_some()
    }

    /// Gallery item ids in display order, `None` for items without one.
    pub fn gallery_items(&self) -> impl Iterator<Item = Option<&str>> {
        self.gallery_data
            .iter()
            .flat_map(|g| g.items.iter().flatten())
            .map(|item| item.media_id.as_deref())
    }

    pub fn gallery_metadata(&self, media_id: &str) -> Option<&MediaMetadata> {
        self.media_metadata.as_ref()?.get(media_id)
    }

    /// Fallback address of the first media attribute carrying a hosted video.
    pub fn video_fallback_url(&self) -> Option<&str> {
        [&self.media, &self.secure_media]
            .into_iter()
            .flatten()
            .find_map(|m| m.reddit_video.as_ref()?.fallback_url.as_deref())
    }

    pub fn first_preview(&self) -> Option<&PreviewImage> {
        self.preview.as_ref()?.images.as_ref()?.first()
    }
}

impl MediaMetadata {
    /// Best address for this gallery item: the still image, else its animated renditions.
    pub fn best_url(&self) -> Option<&str> {
        let s = self.s.as_ref()?;
        s.u.as_deref().or(s.gif.as_deref()).or(s.mp4.as_deref())
    }
}

impl PreviewImage {
    pub fn gif_url(&self) -> Option<&str> { variant_url(self.variants.as_ref()?.gif.as_ref()?) }
    pub fn mp4_url(&self) -> Option<&str> { variant_url(self.variants.as_ref()?.mp4.as_ref()?) }
    pub fn source_url(&self) -> Option<&str> { self.source.as_ref()?.url.as_deref() }
}

fn variant_url(v: &PreviewVariant) -> Option<&str> { v.source.as_ref()?.url.as_deref() }
