use sha2::{Digest, Sha256};

const MAX_STEM_CHARS: usize = 50;

/// Blob-store public id for an artifact name: the name reduced to
/// `[A-Za-z0-9_.-]` with separator runs collapsed, capped at 50 characters,
/// then `_` and 8 hex characters of the SHA-256 of the original name.
pub fn public_id(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            c
        } else {
            '_'
        };
        let is_sep = matches!(c, '_' | '.' | '-');
        if is_sep && stem.ends_with(['_', '.', '-']) {
            continue;
        }
        stem.push(c);
    }
    let stem: String = stem
        .trim_matches(['_', '.', '-'])
        .chars()
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = if stem.is_empty() { "artifact".to_string() } else { stem };

    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{stem}_{}", &digest[..8])
}
