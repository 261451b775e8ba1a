//! POSIX locale names and the lookup order used for localized labels.

/// A parsed `lang_COUNTRY.ENCODING@MODIFIER` locale.  The encoding is dropped;
/// it never takes part in key matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub lang: String,
    pub country: Option<String>,
    pub modifier: Option<String>,
}

impl Locale {
    /// Parse a locale string such as `de_DE.UTF-8@euro`.
    ///
    /// Returns `None` for the empty string and for the `C` / `POSIX` locales,
    /// which carry no translation preference.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw == "C" || raw == "POSIX" || raw.starts_with("C.") {
            return None;
        }

        let (rest, modifier) = match raw.split_once('@') {
            Some((rest, m)) => (rest, Some(m.to_string())),
            None => (raw, None),
        };
        let rest = rest.split('.').next().unwrap_or(rest);
        let (lang, country) = match rest.split_once('_') {
            Some((l, c)) => (l, Some(c.to_string())),
            None => (rest, None),
        };
        if lang.is_empty() {
            return None;
        }

        Some(Self {
            lang: lang.to_string(),
            country,
            modifier,
        })
    }

    /// Keys to try, most specific first:
    /// `lang_COUNTRY@MODIFIER`, `lang_COUNTRY`, `lang@MODIFIER`, `lang`.
    pub fn candidates(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(4);
        if let (Some(c), Some(m)) = (&self.country, &self.modifier) {
            out.push(format!("{}_{c}@{m}", self.lang));
        }
        if let Some(c) = &self.country {
            out.push(format!("{}_{c}", self.lang));
        }
        if let Some(m) = &self.modifier {
            out.push(format!("{}@{m}", self.lang));
        }
        out.push(self.lang.clone());
        out
    }
}
