//! Placeholder substitution in script content.

use indexmap::IndexMap;

/// Ordered token -> value map, e.g. `${schema}` -> `app`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    tokens: IndexMap<String, String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token and its replacement; an existing token keeps its position.
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.tokens.insert(token.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Replace every token occurrence in `content`.
    ///
    /// The content is scanned once left to right; at each position tokens
    /// are tried in insertion order, and substituted text is never scanned
    /// again, so a value can never trigger another replacement.
    pub fn replace(&self, content: &str) -> String {
        if self.tokens.is_empty() {
            return content.to_string();
        }

        let mut out = String::with_capacity(content.len());
        let mut rest = content;
        'scan: while let Some(ch) = rest.chars().next() {
            for (token, value) in &self.tokens {
                if !token.is_empty() && rest.starts_with(token.as_str()) {
                    out.push_str(value);
                    rest = &rest[token.len()..];
                    continue 'scan;
                }
            }
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
        out
    }
}

impl From<IndexMap<String, String>> for Placeholders {
    fn from(tokens: IndexMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Placeholders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tokens: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Replace placeholders in `content`.
pub fn replace_placeholders(content: &str, placeholders: &Placeholders) -> String {
    placeholders.replace(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_placeholders() {
        let p = Placeholders::new();
        assert_eq!(p.replace("SELECT ${x}"), "SELECT ${x}");
    }

    #[test]
    fn test_simple_replacement() {
        let p: Placeholders = [("${schema}", "app"), ("${user}", "admin")]
            .into_iter()
            .collect();
        assert_eq!(
            replace_placeholders("CREATE TABLE ${schema}.t OWNER ${user}; -- ${schema}", &p),
            "CREATE TABLE app.t OWNER admin; -- app"
        );
    }

    #[test]
    fn test_replaced_text_not_rescanned() {
        let p: Placeholders = [("${a}", "${b}"), ("${b}", "x")].into_iter().collect();
        assert_eq!(p.replace("${a} ${b}"), "${b} x");
    }

    #[test]
    fn test_insertion_order_wins() {
        let p: Placeholders = [("${ab", "1"), ("${abc}", "2")].into_iter().collect();
        assert_eq!(p.replace("${abc}"), "1c}");
    }

    #[test]
    fn test_multibyte_content() {
        let p: Placeholders = [("${x}", "é")].into_iter().collect();
        assert_eq!(p.replace("ü ${x} ü"), "ü é ü");
    }
}
