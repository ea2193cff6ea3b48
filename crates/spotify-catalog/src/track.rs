//! Search response payloads and track transformation
//!
//! The wire types mirror the catalog API's search payload shape; `Track` is
//! the flattened form the rest of the application consumes. Transformation
//! joins artist names in payload order, picks the album art size closest to
//! the display target, and normalizes a missing preview URL to an empty
//! string so consumers never branch on `null`.

use serde::Deserialize;

/// Display target for album art; the API typically offers 64/300/640 px.
const ALBUM_ART_TARGET_PX: u32 = 300;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackPage {
    #[serde(default)]
    pub items: Vec<TrackObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackObject {
    pub id: String,
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    #[serde(default)]
    pub album: AlbumObject,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtistObject {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AlbumObject {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageObject>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageObject {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// A search result ready for display and playback queueing.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    /// All credited artists, comma-joined in payload order
    pub artists: String,
    pub album: String,
    /// URL of the album image closest to the display size; empty when the
    /// album carries no images
    pub album_art_url: String,
    /// Empty string when the API returns no preview clip
    pub preview_url: String,
    pub uri: String,
    pub duration_ms: u64,
}

impl From<TrackObject> for Track {
    fn from(raw: TrackObject) -> Self {
        let artists = raw
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let album_art_url = select_album_art(&raw.album.images);
        Self {
            id: raw.id,
            name: raw.name,
            artists,
            album: raw.album.name,
            album_art_url,
            preview_url: raw.preview_url.unwrap_or_default(),
            uri: raw.uri,
            duration_ms: raw.duration_ms,
        }
    }
}

/// Pick the image whose reported size is closest to the display target.
/// Images without dimensions lose to any sized image but still beat nothing.
fn select_album_art(images: &[ImageObject]) -> String {
    images
        .iter()
        .min_by_key(|image| {
            image
                .width
                .or(image.height)
                .map(|d| d.abs_diff(ALBUM_ART_TARGET_PX))
                .unwrap_or(u32::MAX)
        })
        .map(|image| image.url.clone())
        .unwrap_or_default()
}
