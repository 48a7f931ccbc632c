//! Slug and SKU helpers.

const VIETNAMESE_FOLDS: &[(&str, char)] = &[
    ("àáạảãâầấậẩẫăằắặẳẵ", 'a'),
    ("èéẹẻẽêềếệểễ", 'e'),
    ("ìíịỉĩ", 'i'),
    ("òóọỏõôồốộổỗơờớợởỡ", 'o'),
    ("ùúụủũưừứựửữ", 'u'),
    ("ỳýỵỷỹ", 'y'),
    ("đ", 'd'),
];

fn fold_char(c: char) -> char {
    VIETNAMESE_FOLDS
        .iter()
        .find(|(set, _)| set.contains(c))
        .map(|(_, base)| *base)
        .unwrap_or(c)
}

/// Lowercase, fold Vietnamese diacritics, drop punctuation, join words with `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.trim().to_lowercase().chars().map(fold_char) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }

    slug
}

/// `base`, `base-1`, `base-2`, ... for the given attempt.
pub fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

/// First eight uppercase ASCII alphanumerics of the name, `PRODUCT` when none remain.
pub fn sku_base(name: &str) -> String {
    let base: String = name
        .to_lowercase()
        .chars()
        .map(fold_char)
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_uppercase();

    if base.is_empty() {
        "PRODUCT".to_string()
    } else {
        base
    }
}

/// SKU candidate for a 1-based counter: `SONYWH10-001`.
pub fn sku_candidate(base: &str, counter: u32) -> String {
    format!("{}-{:03}", base, counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("Loa Bluetooth JBL", "loa-bluetooth-jbl")]
    #[test_case("  Sửa chữa   Ampli  ", "sua-chua-ampli")]
    #[test_case("Dịch vụ lắp đặt!!", "dich-vu-lap-dat")]
    #[test_case("Tai nghe -- Sony", "tai-nghe-sony")]
    #[test_case("???", "")]
    fn slugifies(input: &str, expected: &str) {
        assert_eq!(slugify(input), expected);
    }

    #[test]
    fn suffixes_slugs() {
        assert_eq!(with_suffix("loa", 0), "loa");
        assert_eq!(with_suffix("loa", 2), "loa-2");
    }

    #[test]
    fn builds_sku() {
        assert_eq!(sku_base("Sony WH-1000XM5"), "SONYWH10");
        assert_eq!(sku_base("Đầu CD"), "DAUCD");
        assert_eq!(sku_base("!!!"), "PRODUCT");
        assert_eq!(sku_candidate("SONYWH10", 1), "SONYWH10-001");
    }
}
