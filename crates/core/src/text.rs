//! Text normalization for name-based matching

/// Normalize a category name for comparison: lowercase, strip the common
/// Latin diacritics, collapse runs of whitespace.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let folded: String = lowered.chars().map(fold_diacritic).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}
