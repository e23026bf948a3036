//! Shared helpers for queries, uploads and sessions

use rand::Rng;

/// Escape LIKE wildcards so user input matches literally (use with `ESCAPE '\'`)
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Get file extension (lowercase, with leading dot), empty if none
pub fn get_ext(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(pos) if pos > 0 => name[pos..].to_lowercase(),
        _ => String::new(),
    }
}

/// Detect the image format from the first bytes of a file.
/// Returns the canonical extension.
pub fn sniff_image(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(".jpg");
    }
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(".png");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some(".gif");
    }
    if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        return Some(".webp");
    }
    None
}

/// Check that `ext` is allowed and matches the sniffed content.
/// `.jpeg` is treated as `.jpg`.
pub fn image_matches_extension(ext: &str, data: &[u8]) -> bool {
    let ext = if ext == ".jpeg" { ".jpg" } else { ext };
    sniff_image(data) == Some(ext)
}

/// Random alphanumeric token, used for session ids
pub fn generate_token(length: usize) -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_get_ext() {
        assert_eq!(get_ext("cake.JPG"), ".jpg");
        assert_eq!(get_ext("dir.v2/cake"), "");
        assert_eq!(get_ext(".hidden"), "");
        assert_eq!(get_ext("a.tar.gz"), ".gz");
    }

    #[test]
    fn test_sniff_image() {
        assert_eq!(sniff_image(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some(".jpg"));
        assert_eq!(sniff_image(b"\x89PNG\r\n\x1a\n...."), Some(".png"));
        assert_eq!(sniff_image(b"GIF89a...."), Some(".gif"));
        assert_eq!(sniff_image(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(".webp"));
        assert_eq!(sniff_image(b"<html>"), None);
        assert_eq!(sniff_image(&[]), None);
    }

    #[test]
    fn test_image_matches_extension() {
        let jpeg = [0xFF, 0xD8, 0xFF, 0xE0];
        assert!(image_matches_extension(".jpg", &jpeg));
        assert!(image_matches_extension(".jpeg", &jpeg));
        assert!(!image_matches_extension(".png", &jpeg));
    }

    #[test]
    fn test_generate_token() {
        let a = generate_token(64);
        let b = generate_token(64);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
