use serde::{Deserialize, Serialize};

/// What a search session is looking for. Created once per session when the
/// query resolves against the catalog, dropped on stop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTarget {
    /// Canonical display name, e.g. "Keys".
    pub item_name: String,
    /// Detection model that knows this item.
    pub model_name: String,
}

/// One findable item: canonical name, owning model, and the spoken aliases
/// (including localized ones) that resolve to it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub item_name: String,
    pub model_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl CatalogEntry {
    fn matches_exact(&self, query: &str) -> bool {
        self.item_name.eq_ignore_ascii_case(query)
            || self.aliases.iter().any(|a| {
                // Non-ASCII aliases (localized names) need full case folding.
                a.to_lowercase() == query.to_lowercase()
            })
    }
}

/// The catalog of items the detection models know about. Resolution tries
/// an exact match on names and aliases first, then falls back to fuzzy
/// subsequence scoring across the same set.
#[derive(Clone, Debug, Default)]
pub struct TargetCatalog {
    entries: Vec<CatalogEntry>,
}

impl TargetCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// The built-in COCO-backed catalog with common household items.
    pub fn builtin() -> Self {
        let entry = |item: &str, aliases: &[&str]| CatalogEntry {
            item_name: item.to_string(),
            model_name: "yolo11mCOCO".to_string(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
        };
        Self::new(vec![
            entry("Keys", &["key", "keychain", "ключи"]),
            entry("Cup", &["mug", "glass", "чашка"]),
            entry("Bottle", &["water bottle", "бутылка"]),
            entry("Cell phone", &["phone", "mobile", "телефон"]),
            entry("Backpack", &["bag", "rucksack", "рюкзак"]),
            entry("Remote", &["remote control", "пульт"]),
            entry("Scissors", &["ножницы"]),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Resolve a spoken or typed query to a target. Exact name/alias match
    /// wins; otherwise the best fuzzy-scoring entry above the acceptance
    /// floor. Returns `None` when nothing in the catalog is close enough.
    pub fn resolve(&self, query: &str) -> Option<SearchTarget> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(entry) = self.entries.iter().find(|e| e.matches_exact(query)) {
            return Some(SearchTarget {
                item_name: entry.item_name.clone(),
                model_name: entry.model_name.clone(),
            });
        }

        let query_chars: Vec<char> = query.to_lowercase().chars().collect();
        let mut best: Option<(i32, &CatalogEntry)> = None;
        for entry in &self.entries {
            let candidates =
                std::iter::once(&entry.item_name).chain(entry.aliases.iter());
            for candidate in candidates {
                if let Some(score) = fuzzy_score(&query_chars, &candidate.to_lowercase()) {
                    if best.map_or(true, |(b, _)| score > b) {
                        best = Some((score, entry));
                    }
                }
            }
        }

        // A bare subsequence hit is too permissive for spoken queries;
        // require at least one consecutive-run or boundary bonus.
        let floor = query_chars.len() as i32 * 10 + 5;
        best.filter(|(score, _)| *score >= floor)
            .map(|(_, entry)| SearchTarget {
                item_name: entry.item_name.clone(),
                model_name: entry.model_name.clone(),
            })
    }
}

/// Subsequence fuzzy score. Returns `None` unless every query char appears
/// in order in the target. Higher is better: consecutive matches and word
/// boundary hits score above scattered ones, exact prefixes above both.
fn fuzzy_score(query: &[char], target: &str) -> Option<i32> {
    if query.is_empty() {
        return Some(0);
    }

    let target_chars: Vec<char> = target.chars().collect();
    if target_chars.is_empty() {
        return None;
    }

    let mut score: i32 = 0;
    let mut query_idx = 0;
    let mut prev_match_idx: Option<usize> = None;
    let mut first_match_idx: Option<usize> = None;

    for (target_idx, &target_char) in target_chars.iter().enumerate() {
        if query_idx < query.len() && target_char == query[query_idx] {
            score += 10;

            if first_match_idx.is_none() {
                first_match_idx = Some(target_idx);
            }
            if let Some(prev_idx) = prev_match_idx {
                if target_idx == prev_idx + 1 {
                    score += 15;
                }
            }
            // Word boundary bonus
            if target_idx == 0
                || target_chars
                    .get(target_idx.wrapping_sub(1))
                    .is_some_and(|c| *c == ' ' || *c == '-' || *c == '_')
            {
                score += 10;
            }

            prev_match_idx = Some(target_idx);
            query_idx += 1;
        }
    }

    if query_idx < query.len() {
        return None;
    }

    if first_match_idx == Some(0) {
        score += 10;
    }
    // Penalize length difference so "key" prefers "keys" over "keychain".
    score -= (target_chars.len() as i32 - query.len() as i32).max(0);

    Some(score)
}
