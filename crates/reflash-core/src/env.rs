//! Variable environment for flash scripts.
//!
//! Scripts set variables with `NAME = value` lines and reference them as
//! `$NAME` inside command arguments. The environment is an ordered mapping
//! from name to string value; substitution is textual and happens once, on
//! the raw argument text, before tokenization.
//!
//! # Example
//!
//! ```
//! use reflash_core::env::Environment;
//!
//! let mut env = Environment::new();
//! env.set("NAME", "boot");
//! assert_eq!(env.substitute("FLASH($NAME, x.img)"), "FLASH(boot, x.img)");
//! ```

/// Ordered mapping of variable name to string value.
///
/// Names are case-sensitive. Insertion order is preserved so that
/// substitution is deterministic for a fixed environment snapshot.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: Vec<(String, String)>,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl Environment {
    /// Creates an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, overwriting any previous value.
    ///
    /// No validation is performed on the name or value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.vars.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((name, value)),
        }
    }

    /// Returns the value of a variable, or the empty string if unset.
    pub fn get(&self, name: &str) -> &str {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Returns the number of variables set.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if no variables are set.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Replaces `$NAME` references in `text` with current variable values.
    ///
    /// The text is scanned left to right exactly once. At each `$`, variables
    /// are tried in insertion order and the first whose name is a prefix of
    /// the following characters wins. Substituted values are not re-scanned,
    /// so a value containing `$OTHER` stays literal. References to unknown
    /// variables are left untouched. There is no escape syntax for a literal
    /// `$`.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let word_len = after.chars().take_while(|c| is_word_char(*c)).count();
            let word: String = after.chars().take(word_len).collect();
            match self
                .vars
                .iter()
                .find(|(n, _)| !n.is_empty() && word.starts_with(n.as_str()))
            {
                Some((name, value)) => {
                    out.push_str(value);
                    rest = &after[name.len()..];
                }
                None => {
                    out.push('$');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_unknown_returns_empty() {
        let env = Environment::new();
        assert_eq!(env.get("MISSING"), "");
    }

    #[test]
    fn set_overwrites() {
        let mut env = Environment::new();
        env.set("X", "1");
        env.set("X", "2");
        assert_eq!(env.get("X"), "2");
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn substitute_basic() {
        let mut env = Environment::new();
        env.set("NAME", "boot");
        assert_eq!(env.substitute("FLASH($NAME, x.img)"), "FLASH(boot, x.img)");
    }

    #[test]
    fn substitute_multiple_occurrences() {
        let mut env = Environment::new();
        env.set("P", "system");
        assert_eq!(env.substitute("$P/$P.img"), "system/system.img");
    }

    #[test]
    fn substitute_unknown_left_literal() {
        let env = Environment::new();
        assert_eq!(env.substitute("FLASH($NOPE, x)"), "FLASH($NOPE, x)");
    }

    #[test]
    fn substituted_value_not_rescanned() {
        let mut env = Environment::new();
        env.set("A", "$B");
        env.set("B", "boom");
        assert_eq!(env.substitute("val=$A"), "val=$B");
    }

    #[test]
    fn insertion_order_prefix_match() {
        let mut env = Environment::new();
        env.set("NAME", "x");
        env.set("NAMES", "y");
        // NAME was inserted first, so it wins the prefix match.
        assert_eq!(env.substitute("$NAMES"), "xS");
    }

    #[test]
    fn dollar_without_name() {
        let mut env = Environment::new();
        env.set("X", "1");
        assert_eq!(env.substitute("cost: 5$"), "cost: 5$");
        assert_eq!(env.substitute("$ X"), "$ X");
    }

    #[test]
    fn empty_text() {
        let mut env = Environment::new();
        env.set("X", "1");
        assert_eq!(env.substitute(""), "");
    }
}
