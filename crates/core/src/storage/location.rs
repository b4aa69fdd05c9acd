//! Location naming shared by the storage backends.

use chrono::{DateTime, Utc};

/// Builds a collision-resistant location for a new object:
/// `[prefix/]YYYY/MM/DD/<stem>_<8 hex>[.<ext>]`.
pub fn generate_location(prefix: Option<&str>, suggested_name: &str, now: DateTime<Utc>) -> String {
    let name = sanitize_name(suggested_name);
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name.as_str(), None),
    };
    let stem = if stem.is_empty() { "file" } else { stem };

    let unique = uuid::Uuid::new_v4().simple().to_string();
    let mut location = String::new();
    if let Some(prefix) = prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        location.push_str(prefix);
        location.push('/');
    }
    location.push_str(&now.format("%Y/%m/%d/").to_string());
    location.push_str(stem);
    location.push('_');
    location.push_str(&unique[..8]);
    if let Some(ext) = ext {
        location.push('.');
        location.push_str(&ext.to_ascii_lowercase());
    }
    location
}

/// Reduces a client-supplied file name to a safe single path segment.
fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or_default();
    let replaced = base.replace("..", "_");
    replaced
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_location_shape() {
        let loc = generate_location(None, "My Photo.JPEG", fixed_now());
        assert!(loc.starts_with("2024/03/07/My_Photo_"), "{}", loc);
        assert!(loc.ends_with(".jpeg"), "{}", loc);
        let unique = loc
            .trim_start_matches("2024/03/07/My_Photo_")
            .trim_end_matches(".jpeg");
        assert_eq!(unique.len(), 8);
        assert!(unique.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_prefix_and_no_extension() {
        let loc = generate_location(Some("/uploads/"), "README", fixed_now());
        assert!(loc.starts_with("uploads/2024/03/07/README_"), "{}", loc);
        assert!(!loc.contains('.'));
    }

    #[test]
    fn test_traversal_is_neutralised() {
        let loc = generate_location(None, "../../etc/passwd", fixed_now());
        assert!(loc.starts_with("2024/03/07/passwd_"), "{}", loc);

        let loc = generate_location(None, "..", fixed_now());
        assert!(!loc.contains(".."), "{}", loc);
        assert!(loc.starts_with("2024/03/07/_"), "{}", loc);
    }

    #[test]
    fn test_same_name_never_collides() {
        let a = generate_location(None, "a.png", fixed_now());
        let b = generate_location(None, "a.png", fixed_now());
        assert_ne!(a, b);
    }
}
