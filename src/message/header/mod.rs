//! Message header fields
// https://tools.ietf.org/html/rfc5322#section-2.2

use std::slice;

/// Ordered collection of header fields.
///
/// Field names are kept exactly as supplied and compared case-sensitively.
/// Each field holds one or more values which are written joined by `, `.
/// Replacing a field keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<(String, Vec<String>)>,
}

impl Header {
    /// An empty header
    #[inline]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Sets `field` to `values`, replacing any previous values
    pub fn set<F: Into<String>>(&mut self, field: F, values: Vec<String>) {
        let field = field.into();
        match self.find_mut(&field) {
            Some(existing) => *existing = values,
            None => self.fields.push((field, values)),
        }
    }

    /// Values of `field`, if set
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, values)| values.as_slice())
    }

    /// Whether `field` is set
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Removes `field`, returning its values
    pub fn remove(&mut self, field: &str) -> Option<Vec<String>> {
        let idx = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(idx).1)
    }

    /// Removes every field
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is set
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in insertion order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.fields.iter(),
        }
    }

    fn find_mut(&mut self, field: &str) -> Option<&mut Vec<String>> {
        self.fields
            .iter_mut()
            .find(|(name, _)| name == field)
            .map(|(_, values)| values)
    }
}

/// Iterator over the fields of a [`Header`]
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: slice::Iter<'a, (String, Vec<String>)>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a str, &'a [String]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a Header {
    type Item = (&'a str, &'a [String]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Header;

    #[test]
    fn set_keeps_position() {
        let mut header = Header::new();
        header.set("From", vec!["a@example.com".to_owned()]);
        header.set("To", vec!["b@example.com".to_owned()]);
        header.set("From", vec!["c@example.com".to_owned()]);

        let fields = header.iter().collect::<Vec<_>>();
        assert_eq!(
            fields,
            vec![
                ("From", &["c@example.com".to_owned()][..]),
                ("To", &["b@example.com".to_owned()][..]),
            ]
        );
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut header = Header::new();
        header.set("X-Mailer", vec!["a".to_owned()]);
        assert!(header.contains("X-Mailer"));
        assert!(!header.contains("x-mailer"));
    }

    #[test]
    fn remove_and_clear() {
        let mut header = Header::new();
        header.set("Subject", vec!["Hello".to_owned()]);
        header.set("Bcc", vec!["x@example.com".to_owned()]);
        assert_eq!(header.remove("Subject"), Some(vec!["Hello".to_owned()]));
        assert_eq!(header.remove("Subject"), None);
        assert_eq!(header.len(), 1);
        header.clear();
        assert!(header.is_empty());
    }
}
