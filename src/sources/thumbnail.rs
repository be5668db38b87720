//! Thumbnail fallback for tracks whose provider returned no artwork.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

const THUMBNAIL_URL_BASE: &str = "https://img.youtube.com/vi/{video_id}/hqdefault.jpg";

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:v=|v/|embed/|youtu\.be/|/v=)([^&?"'>/]+)"#).expect("valid video id regex")
});

/// Verifica si la URL pertenece a YouTube
pub fn is_video_host(uri: &str) -> bool {
    match Url::parse(uri) {
        Ok(url) => url.host_str().is_some_and(|host| {
            let host = host.trim_start_matches("www.");
            host == "youtu.be"
                || host == "youtube.com"
                || host.ends_with(".youtube.com")
                || host == "youtube-nocookie.com"
        }),
        Err(_) => uri.contains("youtube.com/") || uri.contains("youtu.be/"),
    }
}

/// Extracts the video id: the `v` query parameter first, then the path of a
/// `youtu.be` short link, then a regex over the raw text.
pub fn extract_video_id(uri: &str) -> Option<String> {
    if let Ok(url) = Url::parse(uri) {
        if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "v") {
            if !id.is_empty() {
                return Some(id.into_owned());
            }
        }

        if url.host_str() == Some("youtu.be") {
            if let Some(segment) = url.path_segments().and_then(|mut s| s.next()) {
                if !segment.is_empty() {
                    return Some(segment.to_string());
                }
            }
        }
    }

    VIDEO_ID_REGEX
        .captures(uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Thumbnail HQ para una URL de YouTube, `None` si no se reconoce
pub fn youtube_thumbnail(uri: &str) -> Option<String> {
    if !is_video_host(uri) {
        return None;
    }

    extract_video_id(uri).map(|video_id| THUMBNAIL_URL_BASE.replace("{video_id}", &video_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn short_link_uses_path_segment() {
        assert_eq!(
            youtube_thumbnail("https://youtu.be/abc123"),
            Some("https://img.youtube.com/vi/abc123/hqdefault.jpg".to_string())
        );
    }

    #[test]
    fn watch_url_prefers_query_parameter() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ&t=42"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn embed_url_falls_back_to_regex() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/xyz789?autoplay=1"),
            Some("xyz789".to_string())
        );
    }

    #[test]
    fn other_hosts_get_no_thumbnail() {
        assert_eq!(youtube_thumbnail("https://soundcloud.com/artist/song"), None);
        assert_eq!(youtube_thumbnail("https://www.youtube.com/"), None);
    }

    #[test]
    fn music_subdomain_counts_as_video_host() {
        assert!(is_video_host("https://music.youtube.com/watch?v=test"));
        assert!(!is_video_host("https://example.com/video"));
    }
}
