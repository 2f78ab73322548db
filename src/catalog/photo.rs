//! Photo URL normalization applied while seeding the store.

use regex::Regex;
use std::sync::OnceLock;

use super::models::{PhotoSource, ProductView};

fn absolute_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://").expect("static regex"))
}

/// True when `url` already carries an http(s) scheme.
pub fn is_absolute(url: &str) -> bool {
    absolute_url().is_match(url)
}

/// Joins a backend-relative path onto the origin with exactly one `/`.
pub fn join_origin(base_origin: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_origin.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Applies, in order: missing/blank -> placeholder, relative -> prefixed with
/// the origin, absolute -> verbatim.
///
/// The source is `Placeholder` whenever the final URL equals the placeholder,
/// even if the backend itself sent that URL.
pub fn normalize_photo(
    photo: Option<&str>,
    base_origin: &str,
    placeholder: &str,
) -> (String, PhotoSource) {
    let url = match photo.map(str::trim) {
        None | Some("") => placeholder.to_string(),
        Some(p) if is_absolute(p) => p.to_string(),
        Some(p) => join_origin(base_origin, p),
    };
    let source = if url == placeholder {
        PhotoSource::Placeholder
    } else {
        PhotoSource::Backend
    };
    (url, source)
}

/// A record enters the resolution pipeline iff its photo is the placeholder.
pub fn needs_resolution(view: &ProductView, placeholder: &str) -> bool {
    view.photo == placeholder
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "http://localhost:8000";
    const PH: &str = "https://via.placeholder.com/400x200?text=No+Image";

    #[test]
    fn absent_or_blank_photo_uses_placeholder() {
        assert_eq!(
            normalize_photo(None, ORIGIN, PH),
            (PH.to_string(), PhotoSource::Placeholder)
        );
        assert_eq!(normalize_photo(Some(""), ORIGIN, PH).1, PhotoSource::Placeholder);
        assert_eq!(normalize_photo(Some("   "), ORIGIN, PH).1, PhotoSource::Placeholder);
    }

    #[test]
    fn relative_photo_is_prefixed() {
        let (url, source) = normalize_photo(Some("/media/lamp.jpg"), ORIGIN, PH);
        assert_eq!(url, "http://localhost:8000/media/lamp.jpg");
        assert_eq!(source, PhotoSource::Backend);

        let (url, _) = normalize_photo(Some("media/lamp.jpg"), "http://localhost:8000/", PH);
        assert_eq!(url, "http://localhost:8000/media/lamp.jpg");
    }

    #[test]
    fn absolute_photo_is_verbatim() {
        for p in ["http://cdn/m.jpg", "HTTPS://cdn.example.com/a.png"] {
            let (url, source) = normalize_photo(Some(p), ORIGIN, PH);
            assert_eq!(url, p);
            assert_eq!(source, PhotoSource::Backend);
        }
    }

    #[test]
    fn backend_sent_placeholder_is_still_eligible() {
        let (url, source) = normalize_photo(Some(PH), ORIGIN, PH);
        assert_eq!(url, PH);
        assert_eq!(source, PhotoSource::Placeholder);
    }
}
