//! Turning free-form city or zone names into canonical timezone identifiers.
//!
//! `normalize` folds away diacritics, case, punctuation and spacing so that
//! "México", "  mexico " and "MEXICO" all produce the same key. A
//! [`TimezoneCatalog`] then resolves that key against the IANA identifiers,
//! either exactly ("europe/paris") or by the final path segment ("paris").

use std::sync::OnceLock;

use chrono_tz::{Tz, TZ_VARIANTS};
use regex::Regex;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

static COMBINING_MARKS: OnceLock<Regex> = OnceLock::new();
static NON_ZONE_CHARS: OnceLock<Regex> = OnceLock::new();
static PUNCTUATION: OnceLock<Regex> = OnceLock::new();
static WHITESPACE: OnceLock<Regex> = OnceLock::new();

fn pattern(cell: &'static OnceLock<Regex>, source: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(source).expect("static pattern compiles"))
}

/// Fold a raw city or zone string into a lookup key.
///
/// Inputs that contain a `/` are treated as region/city identifiers and keep
/// only `[a-z0-9/_]`; everything else loses its punctuation and has whitespace
/// runs collapsed to `_`, so "New York" becomes "new_york".
pub fn normalize(raw: &str) -> String {
    let decomposed: String = raw.nfd().collect();
    let lowered = decomposed.trim().to_lowercase();
    let folded = pattern(&COMBINING_MARKS, r"\p{M}+").replace_all(&lowered, "");

    if folded.contains('/') {
        pattern(&NON_ZONE_CHARS, r"[^a-z0-9/_]+")
            .replace_all(&folded, "")
            .into_owned()
    } else {
        let bare = pattern(&PUNCTUATION, r"\p{P}+").replace_all(&folded, "");
        pattern(&WHITESPACE, r"\s+")
            .replace_all(&bare, "_")
            .into_owned()
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    id: String,
    lowered: String,
}

impl CatalogEntry {
    fn last_segment(&self) -> Option<&str> {
        self.lowered.rsplit_once('/').map(|(_, city)| city)
    }
}

/// Immutable, lexicographically ordered set of canonical timezone identifiers.
#[derive(Debug, Clone)]
pub struct TimezoneCatalog {
    entries: Vec<CatalogEntry>,
}

impl Default for TimezoneCatalog {
    fn default() -> Self {
        Self::system()
    }
}

impl TimezoneCatalog {
    /// The IANA database bundled with `chrono-tz`.
    pub fn system() -> Self {
        Self::from_ids(TZ_VARIANTS.iter().map(|tz| tz.name()))
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<CatalogEntry> = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                let lowered = id.to_lowercase();
                CatalogEntry { id, lowered }
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.dedup_by(|a, b| a.id == b.id);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .binary_search_by(|entry| entry.id.as_str().cmp(id))
            .is_ok()
    }

    /// Every identifier whose final segment equals `key`, in catalog order.
    pub fn candidates(&self, key: &str) -> Vec<&str> {
        if key.contains('/') {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|entry| entry.last_segment() == Some(key))
            .map(|entry| entry.id.as_str())
            .collect()
    }

    /// Resolve an already-normalized key.
    ///
    /// An exact match anywhere in the catalog beats a final-segment match, so
    /// "utc" yields `UTC` rather than `Etc/UTC`. Among several segment matches
    /// the lexicographically first identifier wins.
    pub fn resolve_key(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        if key.is_empty() {
            return None;
        }
        if let Some(exact) = self.entries.iter().find(|entry| entry.lowered == key) {
            return Some(exact.id.as_str());
        }

        let candidates = self.candidates(&key);
        if candidates.len() > 1 {
            debug!(key = %key, ?candidates, "ambiguous timezone name, using first match");
        }
        candidates.first().copied()
    }

    /// Resolve free-form input.
    ///
    /// Input that already names a catalog identifier (ignoring case and
    /// surrounding whitespace) resolves to it even when normalization would
    /// strip characters such as `+` or `-`, as in `Etc/GMT+5`.
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let trimmed = raw.trim().to_lowercase();
        if let Some(entry) = self.entries.iter().find(|entry| entry.lowered == trimmed) {
            return Some(entry.id.as_str());
        }
        self.resolve_key(&normalize(raw))
    }

    /// Resolve `raw` all the way to a usable [`Tz`].
    pub fn resolve_tz(&self, raw: &str) -> Option<Tz> {
        self.resolve(raw).and_then(|id| id.parse::<Tz>().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_diacritics_case_and_spacing() {
        assert_eq!(normalize("México"), "mexico");
        assert_eq!(normalize("  mexico  "), "mexico");
        assert_eq!(normalize("MEXICO"), "mexico");
        assert_eq!(normalize("New   York"), "new_york");
        assert_eq!(normalize("São Paulo"), "sao_paulo");
        assert_eq!(normalize("St. John's"), "st_johns");
    }

    #[test]
    fn zone_like_input_keeps_only_identifier_characters() {
        assert_eq!(normalize("Europe/Paris"), "europe/paris");
        assert_eq!(normalize("America/Port-au-Prince"), "america/portauprince");
        assert_eq!(normalize(" America/New_York "), "america/new_york");
    }

    #[test]
    fn exact_identifiers_resolve_to_themselves() {
        let catalog = TimezoneCatalog::system();
        for id in ["Europe/Paris", "America/New_York", "Asia/Tokyo", "UTC"] {
            assert_eq!(catalog.resolve(id), Some(id));
            assert_eq!(catalog.resolve(&id.to_uppercase()), Some(id));
        }
    }

    #[test]
    fn bare_city_names_match_final_segment() {
        let catalog = TimezoneCatalog::system();
        let paris = catalog.resolve("Paris").unwrap();
        assert!(paris.to_lowercase().ends_with("/paris"));
        assert_eq!(catalog.resolve("new york"), Some("America/New_York"));
        assert_eq!(catalog.resolve("Zürich"), Some("Europe/Zurich"));
        assert_eq!(catalog.resolve("são paulo"), Some("America/Sao_Paulo"));
    }

    #[test]
    fn utc_prefers_exact_identifier() {
        let catalog = TimezoneCatalog::system();
        assert_eq!(catalog.resolve("UTC"), Some("UTC"));
        assert_eq!(catalog.resolve("utc"), Some("UTC"));
    }

    #[test]
    fn spellings_of_the_same_city_agree() {
        let catalog = TimezoneCatalog::system();
        let a = catalog.resolve("México");
        let b = catalog.resolve("  mexico  ");
        let c = catalog.resolve("MEXICO");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn unknown_and_empty_inputs_do_not_resolve() {
        let catalog = TimezoneCatalog::system();
        assert_eq!(catalog.resolve("Atlantis"), None);
        assert_eq!(catalog.resolve("   "), None);
        assert_eq!(catalog.resolve("!!!"), None);
        assert_eq!(catalog.resolve("Europe/Atlantis"), None);
    }

    #[test]
    fn identifiers_with_signs_and_hyphens_resolve_verbatim() {
        let catalog = TimezoneCatalog::system();
        assert_eq!(catalog.resolve("Etc/GMT+5"), Some("Etc/GMT+5"));
        assert_eq!(
            catalog.resolve("america/port-au-prince"),
            Some("America/Port-au-Prince")
        );
    }

    #[test]
    fn slash_keys_never_use_segment_matching() {
        let catalog = TimezoneCatalog::from_ids(["Europe/Paris"]);
        assert_eq!(catalog.resolve("france/paris"), None);
    }

    #[test]
    fn ambiguous_names_pick_lexicographically_first() {
        let catalog = TimezoneCatalog::from_ids([
            "Zeta/Springfield",
            "Alpha/Springfield",
            "Mid/Springfield",
        ]);
        assert_eq!(catalog.resolve("springfield"), Some("Alpha/Springfield"));
        assert_eq!(
            catalog.candidates("springfield"),
            vec!["Alpha/Springfield", "Mid/Springfield", "Zeta/Springfield"]
        );
    }

    #[test]
    fn system_catalog_is_sorted_and_usable() {
        let catalog = TimezoneCatalog::system();
        assert!(!catalog.is_empty());
        assert!(catalog.contains("Europe/Paris"));
        assert_eq!(catalog.resolve_tz("tokyo"), Some(chrono_tz::Asia::Tokyo));
    }
}
