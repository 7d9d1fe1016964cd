use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

/// Media library folder marker the delivery URLs are keyed on.
const MEDIA_FOLDER: &str = "buildz_pro_public";
/// Delivery transform for gallery-sized thumbnails.
const THUMBNAIL_TRANSFORM: &str = "f_auto,dpr_auto/c_limit,w_400/";

/// Gallery preview slots; the last slot overlays an overflow count.
pub const GALLERY_PREVIEW_LIMIT: usize = 5;

/// Rewrites a delivery URL to its gallery-thumbnail variant.
///
/// Version path segments (`/v12345/`) are stripped, then the thumbnail
/// transform is inserted in front of the media folder. The extension after
/// the folder path is dropped; the delivery host picks the format. URLs
/// that do not contain the folder marker pass through untouched.
pub fn thumbnail_url(url: &str) -> String {
    lazy_static! {
        static ref VERSION_RE: Regex = Regex::new("/v[0-9][^/]*/").unwrap();
        static ref PREFIX_RE: Regex =
            Regex::new(&format!("(?i)(.*/){}", MEDIA_FOLDER)).unwrap();
        static ref SUFFIX_RE: Regex =
            Regex::new(&format!("(?i)/({}/[^.]*)", MEDIA_FOLDER)).unwrap();
    }

    let no_version = VERSION_RE.replace_all(url, "/");

    let prefix = match PREFIX_RE.captures(&no_version).and_then(|caps| caps.get(1)) {
        Some(prefix) => prefix.as_str().to_string(),
        None => return url.to_string(),
    };
    let suffix = match SUFFIX_RE.captures(&no_version).and_then(|caps| caps.get(1)) {
        Some(suffix) => suffix.as_str().to_string(),
        None => return url.to_string(),
    };

    format!("{}{}{}", prefix, THUMBNAIL_TRANSFORM, suffix)
}

/// Thumbnail URLs for the gallery preview slots.
pub fn gallery_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .take(GALLERY_PREVIEW_LIMIT)
        .map(|url| thumbnail_url(url))
        .collect()
}

/// How many images the "N more" overlay on the last slot stands for.
pub fn overflow_count(total: usize) -> Option<usize> {
    if total > GALLERY_PREVIEW_LIMIT {
        Some(total - (GALLERY_PREVIEW_LIMIT - 1))
    } else {
        None
    }
}

/// Best-effort reachability filter for gallery images.
///
/// HEAD-probes each URL in order. Any response keeps the image, whatever
/// the status; only a failed request drops it. Probe failures are logged
/// and swallowed, never surfaced.
pub async fn probe_images(client: &reqwest::Client, urls: &[String]) -> Vec<String> {
    let mut reachable = Vec::new();
    for url in urls {
        match client.head(url).send().await {
            Ok(_) => reachable.push(url.clone()),
            Err(error) => debug!("Dropping unreachable image {}: {}", url, error),
        }
    }
    reachable
}
