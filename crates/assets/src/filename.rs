//! Upload filename validation.
//!
//! Filenames arrive from multipart form fields and cannot be trusted: they
//! may carry path separators, control characters, or no extension at all.

/// Lowercased extension of a filename, if it has one.
pub fn file_extension(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// E-book files must be PDFs.
pub fn is_allowed_ebook(filename: &str) -> bool {
    matches!(file_extension(filename).as_deref(), Some("pdf"))
}

/// Companion audio must be mp3 or wav.
pub fn is_allowed_audio(filename: &str) -> bool {
    matches!(file_extension(filename).as_deref(), Some("mp3" | "wav"))
}

/// Reduce an untrusted filename to a safe relative name for disk storage.
///
/// Keeps ASCII alphanumerics, `-`, `_` and `.`; whitespace becomes `_`;
/// everything else is dropped. Path components before the last separator are
/// discarded, and leading dots are stripped so the result can never traverse
/// or hide. Returns `None` when nothing safe remains.
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let cleaned: String = name
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').trim_matches('_');
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("Report.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension("song.Mp3").as_deref(), Some("mp3"));
    }

    #[test]
    fn extensionless_and_hidden_names_have_no_extension() {
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".gitignore"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn ebook_accepts_pdf_only() {
        assert!(is_allowed_ebook("novel.pdf"));
        assert!(!is_allowed_ebook("novel.txt"));
        assert!(!is_allowed_ebook("novel.epub"));
        assert!(!is_allowed_ebook("novel"));
    }

    #[test]
    fn audio_accepts_mp3_and_wav_only() {
        assert!(is_allowed_audio("chapter1.mp3"));
        assert!(is_allowed_audio("chapter1.wav"));
        assert!(!is_allowed_audio("chapter1.pdf"));
        assert!(!is_allowed_audio("chapter1.flac"));
    }

    #[test]
    fn sanitize_strips_paths_and_unsafe_characters() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("My Great Novel.pdf").as_deref(),
            Some("My_Great_Novel.pdf")
        );
        assert_eq!(
            sanitize_filename("über böse?.pdf").as_deref(),
            Some("ber_bse.pdf")
        );
        assert_eq!(sanitize_filename("C:\\Users\\x\\a.pdf").as_deref(), Some("a.pdf"));
    }

    #[test]
    fn sanitize_rejects_names_with_nothing_safe_left() {
        assert_eq!(sanitize_filename("..."), None);
        assert_eq!(sanitize_filename("???"), None);
        assert_eq!(sanitize_filename(""), None);
    }
}
