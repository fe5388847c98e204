//! Case conversion and keyword matching shared by extraction, resolution and rendering.

/// Suffixes a keyword may carry and still count as the same word.
const INFLECTIONS: &[&str] = &["", "s", "es", "ed", "er", "ers", "ing", "ings"];

/// Case-insensitive match of `needle` in `haystack` starting at a word boundary.
///
/// The match may end in a simple inflection ("blog" matches "blogs", "blogger" and
/// "blogging") but not in an unrelated word ("java" does not match "javascript").
/// `needle` is expected to be lowercase; multi-word needles ("smart home") match as-is.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    find_word(haystack, needle).is_some()
}

/// Byte offset of the first word-bounded occurrence of `needle`.
pub fn find_word(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let hay = haystack.to_lowercase();
    let mut from = 0;
    while let Some(pos) = hay[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let bounded_before = hay[..start].chars().next_back().map_or(true, |c| !c.is_alphanumeric());
        let tail: String = hay[end..].chars().take_while(|c| c.is_alphanumeric()).collect();
        if bounded_before && is_inflection(needle, &tail) {
            return Some(start);
        }
        from = end;
        if from >= hay.len() {
            break;
        }
    }
    None
}

/// `tail` is what follows `needle` up to the end of the word.
fn is_inflection(needle: &str, tail: &str) -> bool {
    if INFLECTIONS.contains(&tail) {
        return true;
    }
    // Doubled final consonant: "shop" -> "shopping", "blog" -> "blogger".
    let Some(last) = needle.chars().next_back() else {
        return false;
    };
    let doubled = last.is_ascii_alphabetic() && !matches!(last, 'a' | 'e' | 'i' | 'o' | 'u');
    doubled
        && tail
            .strip_prefix(last)
            .is_some_and(|rest| !rest.is_empty() && INFLECTIONS.contains(&rest))
}

fn words(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in input.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn to_pascal_case(input: &str) -> String {
    words(input).iter().map(|w| capitalize(w)).collect()
}

pub fn to_camel_case(input: &str) -> String {
    let parts = words(input);
    let mut out = String::new();
    for (i, w) in parts.iter().enumerate() {
        if i == 0 {
            out.push_str(w);
        } else {
            out.push_str(&capitalize(w));
        }
    }
    out
}

pub fn to_snake_case(input: &str) -> String {
    words(input).join("_")
}

pub fn to_kebab_case(input: &str) -> String {
    words(input).join("-")
}

/// English plural good enough for resource names.
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with("ss")
        || lower.ends_with('x')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
        || lower.ends_with('z')
    {
        format!("{word}es")
    } else if lower.ends_with('s') {
        word.to_string()
    } else if lower.ends_with('y')
        && !matches!(lower.chars().rev().nth(1), Some('a' | 'e' | 'i' | 'o' | 'u'))
    {
        format!("{}ies", &word[..word.len() - 1])
    } else {
        format!("{word}s")
    }
}

/// "an order", "a product": the article is chosen from the first letter.
pub fn with_article(noun: &str) -> String {
    let article = match noun.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('a' | 'e' | 'i' | 'o' | 'u') => "an",
        _ => "a",
    };
    format!("{article} {noun}")
}

/// Inverse of [`pluralize`] for the regular forms it produces.
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    let cut = |n: usize| word.get(..word.len().saturating_sub(n)).unwrap_or(word).to_string();
    if lower.len() > 3 && lower.ends_with("ies") {
        format!("{}y", cut(3))
    } else if ["sses", "xes", "ches", "shes"].iter().any(|s| lower.ends_with(s)) {
        cut(2)
    } else if lower.len() > 1 && lower.ends_with('s') && !["ss", "us", "is"].iter().any(|s| lower.ends_with(s)) {
        cut(1)
    } else {
        word.to_string()
    }
}

/// Strip Latin diacritics ("Café" -> "Cafe"); other non-ASCII characters are kept.
pub fn fold_ascii(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii() {
            out.push(ch);
            continue;
        }
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        let folded = match lower {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => "a",
            'æ' => "ae",
            'ç' | 'ć' | 'č' => "c",
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' => "e",
            'ì' | 'í' | 'î' | 'ï' | 'ī' => "i",
            'ł' => "l",
            'ñ' | 'ń' => "n",
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => "o",
            'œ' => "oe",
            'ß' => "ss",
            'ś' | 'š' => "s",
            'ù' | 'ú' | 'û' | 'ü' | 'ū' => "u",
            'ý' | 'ÿ' => "y",
            'ź' | 'ż' | 'ž' => "z",
            _ => {
                out.push(ch);
                continue;
            }
        };
        if ch.is_uppercase() {
            out.push_str(&folded.to_uppercase());
        } else {
            out.push_str(folded);
        }
    }
    out
}
