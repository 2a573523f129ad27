//! Helpers and utilities.

/// Convert a `kebab-case` token into `camelCase`.
///
/// Only a dash followed by a lowercase ASCII letter is folded, other dashes
/// are kept as they are.
///
/// ```
/// assert_eq!(wdirective::utils::kebab_to_camel("sun-flower"), "sunFlower");
/// ```
pub fn kebab_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match chars.peek() {
            Some(next) if c == '-' && next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Convert a `camelCase` token into `kebab-case`.
///
/// A dash goes between a lowercase and an uppercase ASCII letter, then the
/// whole token is lowercased.
///
/// ```
/// assert_eq!(wdirective::utils::camel_to_kebab("childrenUpdated"), "children-updated");
/// ```
pub fn camel_to_kebab(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev: Option<char> = None;
    for c in s.chars() {
        if c.is_ascii_uppercase() && prev.is_some_and(|p| p.is_ascii_lowercase()) {
            out.push('-');
        }
        out.push(c);
        prev = Some(c);
    }
    out.to_lowercase()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kebab_round_trips_through_camel() {
        assert_eq!(kebab_to_camel("a"), "a");
        assert_eq!(kebab_to_camel("one-two-three"), "oneTwoThree");
        assert_eq!(camel_to_kebab(&kebab_to_camel("sun-flower")), "sun-flower");
    }

    #[test]
    fn only_letter_boundaries_are_converted() {
        assert_eq!(kebab_to_camel("trailing-"), "trailing-");
        assert_eq!(kebab_to_camel("a-1"), "a-1");
        assert_eq!(kebab_to_camel("a--b"), "a-B");
        assert_eq!(kebab_to_camel("a-B"), "a-B");
        assert_eq!(camel_to_kebab("ABC"), "abc");
        assert_eq!(camel_to_kebab("aBC"), "a-bc");
        assert_eq!(camel_to_kebab("a1B"), "a1b");
        assert_eq!(camel_to_kebab("mounted"), "mounted");
        assert_eq!(camel_to_kebab("oneTwoThree"), "one-two-three");
    }
}
