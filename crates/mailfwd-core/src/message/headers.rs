//! Ordered header multimap

/// One header name with all of its values
///
/// Values are raw bytes so 8-bit headers pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub name: String,
    pub values: Vec<Vec<u8>>,
}

/// Message headers in their original order
///
/// Names are looked up case-insensitively. A repeated name is grouped into
/// the entry where it first appeared, keeping that entry's casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<HeaderEntry>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// First value of a header
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.get_all(name)
            .and_then(|values| values.first())
            .map(Vec::as_slice)
    }

    /// All values of a header
    pub fn get_all(&self, name: &str) -> Option<&[Vec<u8>]> {
        self.position(name)
            .map(|i| self.entries[i].values.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Add a value, grouping it with an existing header of the same name
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].values.push(value.into()),
            None => self.entries.push(HeaderEntry {
                name,
                values: vec![value.into()],
            }),
        }
    }

    /// Replace all values of a header in place, or add it at the end
    pub fn set(&mut self, name: impl Into<String>, values: Vec<Vec<u8>>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.entries[i].values = values,
            None => self.entries.push(HeaderEntry { name, values }),
        }
    }

    /// Remove a header, returning its values
    pub fn remove(&mut self, name: &str) -> Option<Vec<Vec<u8>>> {
        self.position(name)
            .map(|i| self.entries.remove(i).values)
    }

    /// Keep only headers for which the predicate returns true
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&HeaderEntry) -> bool,
    {
        self.entries.retain(|e| keep(e));
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = &'a HeaderEntry;
    type IntoIter = std::slice::Iter<'a, HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(headers: &HeaderMap) -> Vec<&str> {
        headers.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_append_groups_repeated_names() {
        let mut headers = HeaderMap::new();
        headers.append("DKIM-Signature", "a");
        headers.append("From", "sender@example.com");
        headers.append("Dkim-Signature", "b");

        assert_eq!(names(&headers), vec!["DKIM-Signature", "From"]);
        assert_eq!(
            headers.get_all("dkim-signature").unwrap(),
            &[b"a".to_vec(), b"b".to_vec()]
        );
        assert_eq!(headers.get("FROM"), Some(b"sender@example.com".as_slice()));
    }

    #[test]
    fn test_set_keeps_position() {
        let mut headers = HeaderMap::new();
        headers.append("From", "a@example.com");
        headers.append("Subject", "Hi");

        headers.set("from", vec![b"b@example.com".to_vec()]);
        headers.set("Reply-To", vec![b"a@example.com".to_vec()]);

        assert_eq!(names(&headers), vec!["From", "Subject", "Reply-To"]);
        assert_eq!(headers.get("From"), Some(b"b@example.com".as_slice()));
    }

    #[test]
    fn test_remove_and_retain() {
        let mut headers = HeaderMap::new();
        headers.append("Sender", "x@example.com");
        headers.append("X-Keep", "1");
        headers.append("X-Drop", "2");

        assert_eq!(headers.remove("sender"), Some(vec![b"x@example.com".to_vec()]));
        assert_eq!(headers.remove("sender"), None);

        headers.retain(|e| e.name != "X-Drop");
        assert_eq!(names(&headers), vec!["X-Keep"]);
        assert_eq!(headers.len(), 1);
        assert!(!headers.is_empty());
        assert!(!headers.contains("X-Drop"));
    }
}
