//! Deterministic, filesystem-safe output names.

use chrono::NaiveDate;

use crate::codec::OutputFormat;

/// Longest file name produced.
pub const MAX_FILE_NAME_LENGTH: usize = 255;

/// Stem used when sanitizing leaves nothing usable.
pub const FALLBACK_STEM: &str = "untitled";

const RESERVED_NAMES: [&str; 4] = ["CON", "PRN", "AUX", "NUL"];

/// Windows device names (`CON`, `COM1`, `LPT9`, ...) cannot be used as
/// a file stem on every platform.
fn is_reserved(stem: &str) -> bool {
    let upper = stem.to_ascii_uppercase();
    if RESERVED_NAMES.contains(&upper.as_str()) {
        return true;
    }
    match upper.as_bytes() {
        [b'C', b'O', b'M', d] | [b'L', b'P', b'T', d] => (b'1'..=b'9').contains(d),
        _ => false,
    }
}

/// Make `name` safe to write anywhere.
///
/// Characters outside `[A-Za-z0-9.-]` become `_`. Names longer than
/// [`MAX_FILE_NAME_LENGTH`] are shortened, keeping the extension.
/// Reserved device names and names with nothing but `_` and `.` left
/// become [`FALLBACK_STEM`] plus the extension.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    // Only ASCII remains, so byte offsets are char offsets.
    let ext_start = sanitized.rfind('.').filter(|&i| i > 0);
    if sanitized.len() > MAX_FILE_NAME_LENGTH {
        sanitized = match ext_start {
            Some(i) if sanitized.len() - i < MAX_FILE_NAME_LENGTH => {
                let ext = sanitized[i..].to_owned();
                let mut stem = sanitized[..i].to_owned();
                stem.truncate(MAX_FILE_NAME_LENGTH - ext.len());
                stem + &ext
            }
            _ => sanitized[..MAX_FILE_NAME_LENGTH].to_owned(),
        };
    }

    let first_stem = sanitized.split('.').next().unwrap_or_default();
    let only_filler = sanitized.chars().all(|c| c == '_' || c == '.');
    if only_filler || is_reserved(first_stem) {
        let ext = sanitized
            .rfind('.')
            .filter(|&i| i > 0 && i + 1 < sanitized.len())
            .map(|i| &sanitized[i..])
            .filter(|ext| !ext[1..].chars().all(|c| c == '_'))
            .unwrap_or_default();
        return format!("{FALLBACK_STEM}{ext}");
    }
    sanitized
}

/// The part of `name` before its first `.`.
#[must_use]
pub fn file_stem(name: &str) -> &str {
    name.split('.').next().unwrap_or_default()
}

/// `<stem>_converted.<ext>` for a single export.
#[must_use]
pub fn converted_name(source_name: &str, format: OutputFormat) -> String {
    sanitize_file_name(&format!(
        "{}_converted.{}",
        file_stem(source_name),
        format.extension()
    ))
}

/// `<stem>_<size>x<size>.ico` for one bundle entry.
#[must_use]
pub fn bundle_entry_name(source_name: &str, size: u32) -> String {
    sanitize_file_name(&format!("{}_{size}x{size}.ico", file_stem(source_name)))
}

/// `<stem>_icons_<YYYY-MM-DD>.zip` for an icon bundle.
#[must_use]
pub fn bundle_archive_name(source_name: &str, date: NaiveDate) -> String {
    sanitize_file_name(&format!(
        "{}_icons_{}.zip",
        file_stem(source_name),
        date.format("%Y-%m-%d")
    ))
}

/// `converted_images_<YYYY-MM-DD>.zip` for a batch.
#[must_use]
pub fn batch_archive_name(date: NaiveDate) -> String {
    format!("converted_images_{}.zip", date.format("%Y-%m-%d"))
}

/// Today's date in local time.
#[must_use]
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_file_name("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_file_name("café.jpg"), "caf_.jpg");
    }

    #[test]
    fn long_names_keep_extension() {
        let long = format!("{}.png", "a".repeat(300));
        let out = sanitize_file_name(&long);
        assert_eq!(out.len(), MAX_FILE_NAME_LENGTH);
        assert!(out.ends_with(".png"));

        let no_ext = "b".repeat(300);
        assert_eq!(sanitize_file_name(&no_ext).len(), MAX_FILE_NAME_LENGTH);
    }

    #[test]
    fn reserved_and_empty_names_fall_back() {
        assert_eq!(sanitize_file_name("CON.png"), "untitled.png");
        assert_eq!(sanitize_file_name("lpt3"), "untitled");
        assert_eq!(sanitize_file_name("com1.tar.gz"), "untitled.gz");
        assert_eq!(sanitize_file_name("???"), "untitled");
        assert_eq!(sanitize_file_name(""), "untitled");
        assert_eq!(sanitize_file_name("COM10.png"), "COM10.png");
        assert_eq!(sanitize_file_name("console.png"), "console.png");
    }

    #[test]
    fn output_names() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(converted_name("logo.final.png", OutputFormat::WebP), "logo_converted.webp");
        assert_eq!(bundle_entry_name("logo.png", 32), "logo_32x32.ico");
        assert_eq!(bundle_archive_name("my logo.png", date), "my_logo_icons_2024-03-09.zip");
        assert_eq!(batch_archive_name(date), "converted_images_2024-03-09.zip");
    }
}
