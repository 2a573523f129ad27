//! Directive attribute names.
//!
//! A directive attribute looks like `<prefix><name>[:<argument>][.<modifier>]*`,
//! eg `w-foo:bar.a.b`. Nothing about the characters is validated. Malformed
//! names yield empty segments instead of errors.
use std::collections::BTreeSet;

use crate::utils::kebab_to_camel;

/// The set of `.modifier` flags on a directive attribute, camelCased.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers(BTreeSet<String>);

impl Modifiers {
    /// Whether the modifier is set.
    pub fn has(&self, modifier: &str) -> bool {
        self.0.contains(modifier)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Modifiers {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Modifiers(iter.into_iter().map(Into::into).collect())
    }
}

/// The pieces of a raw directive attribute name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedDirective {
    /// The prefixed base name, eg `w-foo`.
    pub name: String,
    pub argument: Option<String>,
    pub modifiers: Modifiers,
}

impl ParsedDirective {
    /// Split a raw attribute name into name, argument and modifiers.
    ///
    /// The argument is the segment between the first and second `:`, so
    /// `w-a:b:c` has the argument `b`. An empty argument is no argument.
    pub fn parse(raw: &str) -> Self {
        let mut segments = raw.split('.');
        let head = segments.next().unwrap_or_default();
        let modifiers = segments.map(kebab_to_camel).collect();
        let mut head = head.split(':');
        let name = head.next().unwrap_or_default();
        let argument = head
            .next()
            .filter(|argument| !argument.is_empty())
            .map(str::to_owned);
        ParsedDirective {
            name: name.to_owned(),
            argument,
            modifiers,
        }
    }

    /// The raw name taken verbatim, for when attribute parameters are off.
    pub fn verbatim(raw: &str) -> Self {
        ParsedDirective {
            name: raw.to_owned(),
            argument: None,
            modifiers: Modifiers::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_argument_and_modifiers() {
        let parsed = ParsedDirective::parse("w-foo:bar.a.b");
        assert_eq!(parsed.name, "w-foo");
        assert_eq!(parsed.argument.as_deref(), Some("bar"));
        assert_eq!(parsed.modifiers, Modifiers::from_iter(["a", "b"]));
    }

    #[test]
    fn modifiers_are_camel_cased() {
        let parsed = ParsedDirective::parse("w-foo.sun-flower");
        assert_eq!(parsed.name, "w-foo");
        assert_eq!(parsed.argument, None);
        assert!(parsed.modifiers.has("sunFlower"));
        assert_eq!(parsed.modifiers.len(), 1);
    }

    #[test]
    fn bare_name() {
        let parsed = ParsedDirective::parse("w-copy");
        assert_eq!(parsed, ParsedDirective::verbatim("w-copy"));
        assert!(parsed.modifiers.is_empty());
    }

    #[test]
    fn malformed_names_pass_empty_segments_through() {
        let parsed = ParsedDirective::parse("w-foo:.");
        assert_eq!(parsed.name, "w-foo");
        assert_eq!(parsed.argument, None);
        assert!(parsed.modifiers.has(""));

        let parsed = ParsedDirective::parse("w-foo:");
        assert_eq!(parsed, ParsedDirective::verbatim("w-foo"));
    }

    #[test]
    fn only_the_second_colon_segment_is_the_argument() {
        let parsed = ParsedDirective::parse("w-a:b:c.x");
        assert_eq!(parsed.name, "w-a");
        assert_eq!(parsed.argument.as_deref(), Some("b"));
        assert!(parsed.modifiers.has("x"));
    }
}
