//! File extension inference from response metadata.

use regex::Regex;
use reqwest::header::{self, HeaderMap};
use std::sync::LazyLock;
use url::Url;

static DISPOSITION_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filename=([^;]+)").expect("invalid filename pattern"));

/// Infer a file extension (with its leading dot) for a downloaded response.
///
/// In order of preference:
/// 1. the `filename=` parameter of `content-disposition`
/// 2. the last path segment of `final_url`
/// 3. the `content-type` media type, through the standard extension table
///
/// The filename sources only apply when the name contains a dot. Returns
/// `None` when nothing identifies the type.
pub fn resolve_extension(headers: &HeaderMap, final_url: &Url) -> Option<String> {
    let filename = disposition_filename(headers).unwrap_or_else(|| url_filename(final_url));

    if let Some((_, suffix)) = filename.rsplit_once('.') {
        return Some(format!(".{suffix}"));
    }

    content_type_extension(headers)
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn disposition_filename(headers: &HeaderMap) -> Option<String> {
    let disposition = header_str(headers, header::CONTENT_DISPOSITION)?;
    let captures = DISPOSITION_FILENAME.captures(disposition)?;
    let name = captures[1].trim().trim_matches('"');
    Some(name.to_string())
}

fn url_filename(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string()
}

fn content_type_extension(headers: &HeaderMap) -> Option<String> {
    let content_type = header_str(headers, header::CONTENT_TYPE).unwrap_or_default();
    let media_type = content_type.split(';').next().unwrap_or_default().trim().to_lowercase();

    match media_type.as_str() {
        "" => None,
        "text/plain" => Some(".txt".to_string()),
        "image/jpeg" => Some(".jpg".to_string()),
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first())
            .map(|ext| format!(".{ext}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), value.parse().unwrap());
        }
        map
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_disposition_wins_over_url_and_content_type() {
        let h = headers(&[
            (header::CONTENT_DISPOSITION, r#"attachment; filename="x.png""#),
            (header::CONTENT_TYPE, "image/jpeg"),
        ]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/pic.gif")).as_deref(), Some(".png"));
    }

    #[test]
    fn test_disposition_unquoted_with_trailing_params() {
        let h = headers(&[(header::CONTENT_DISPOSITION, "inline; filename=meme.final.webp; size=2048")]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/x")).as_deref(), Some(".webp"));
    }

    #[test]
    fn test_undotted_disposition_falls_through_to_content_type() {
        let h = headers(&[
            (header::CONTENT_DISPOSITION, r#"attachment; filename="download""#),
            (header::CONTENT_TYPE, "image/gif"),
        ]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/pic.png")).as_deref(), Some(".gif"));
    }

    #[test]
    fn test_url_segment_without_query_or_fragment() {
        let h = HeaderMap::new();
        let u = url("https://cdn.example.com/memes/2024/funny.jpeg?w=640&v=1.5#top");
        assert_eq!(resolve_extension(&h, &u).as_deref(), Some(".jpeg"));
    }

    #[test]
    fn test_jpeg_content_type_maps_to_jpg() {
        let h = headers(&[(header::CONTENT_TYPE, "image/jpeg")]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/image/12345")).as_deref(), Some(".jpg"));
    }

    #[test]
    fn test_content_type_ignores_params_and_case() {
        let h = headers(&[(header::CONTENT_TYPE, "Text/Plain; charset=UTF-8")]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/raw")).as_deref(), Some(".txt"));

        let h = headers(&[(header::CONTENT_TYPE, "IMAGE/JPEG;q=1")]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/raw")).as_deref(), Some(".jpg"));
    }

    #[test]
    fn test_content_type_table_lookup() {
        let h = headers(&[(header::CONTENT_TYPE, "image/png")]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/")).as_deref(), Some(".png"));
    }

    #[test]
    fn test_unknown_content_type() {
        let h = headers(&[(header::CONTENT_TYPE, "application/x-made-up-type")]);
        assert_eq!(resolve_extension(&h, &url("https://example.com/blob")), None);
    }

    #[test]
    fn test_no_headers_no_dot() {
        assert_eq!(resolve_extension(&HeaderMap::new(), &url("https://example.com/aleatorio/")), None);
    }
}
