use std::collections::{BTreeMap, HashMap};

use crate::models::NewsItem;

pub const KEYWORD_CATEGORY: &str = "keyword";
pub const SOURCE_CATEGORY: &str = "source";

/// One selectable label inside a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceLabel {
    pub label: String,
    pub enabled: bool,
    /// At least one item carrying this label is recommended
    pub recommended: bool,
    pub item_count: usize,
}

/// Local, unpersisted category filter edited from the management tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPreferences {
    categories: BTreeMap<String, Vec<PreferenceLabel>>,
}

impl CategoryPreferences {
    /// Keyword and source categories of `items`, every label enabled.
    /// Labels are ordered by item count, most frequent first.
    pub fn from_catalog(items: &[NewsItem], recommended_tag: &str) -> Self {
        let mut categories = BTreeMap::new();
        categories.insert(
            KEYWORD_CATEGORY.to_string(),
            collect_labels(items, recommended_tag, |item| &item.keyword),
        );
        categories.insert(
            SOURCE_CATEGORY.to_string(),
            collect_labels(items, recommended_tag, |item| &item.source),
        );
        Self { categories }
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[PreferenceLabel])> {
        self.categories
            .iter()
            .map(|(name, labels)| (name.as_str(), labels.as_slice()))
    }

    pub fn labels(&self, category: &str) -> &[PreferenceLabel] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Flip a label, returning its new state, or `None` if it does not exist.
    pub fn toggle(&mut self, category: &str, label: &str) -> Option<bool> {
        let entry = self
            .categories
            .get_mut(category)?
            .iter_mut()
            .find(|l| l.label == label)?;
        entry.enabled = !entry.enabled;
        Some(entry.enabled)
    }

    /// Unknown labels count as enabled.
    pub fn is_enabled(&self, category: &str, label: &str) -> bool {
        self.labels(category)
            .iter()
            .find(|l| l.label == label)
            .map(|l| l.enabled)
            .unwrap_or(true)
    }

    /// Whether neither the keyword nor the source of `item` is switched off.
    pub fn allows(&self, item: &NewsItem) -> bool {
        self.is_enabled(KEYWORD_CATEGORY, &item.keyword) && self.is_enabled(SOURCE_CATEGORY, &item.source)
    }
}

fn collect_labels<'a>(
    items: &'a [NewsItem],
    recommended_tag: &str,
    label_of: impl Fn(&'a NewsItem) -> &'a String,
) -> Vec<PreferenceLabel> {
    let mut counts: HashMap<&str, (usize, bool)> = HashMap::new();
    for item in items {
        let label = label_of(item).as_str();
        if label.is_empty() {
            continue;
        }
        let entry = counts.entry(label).or_insert((0, false));
        entry.0 += 1;
        entry.1 |= item.has_tag(recommended_tag);
    }

    let mut labels: Vec<PreferenceLabel> = counts
        .into_iter()
        .map(|(label, (item_count, recommended))| PreferenceLabel {
            label: label.to_string(),
            enabled: true,
            recommended,
            item_count,
        })
        .collect();
    labels.sort_by(|a, b| b.item_count.cmp(&a.item_count).then_with(|| a.label.cmp(&b.label)));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fallback_catalog;

    #[test]
    fn labels_are_counted_and_ordered() {
        let prefs = CategoryPreferences::from_catalog(&fallback_catalog(), "recommended");

        let sources = prefs.labels(SOURCE_CATEGORY);
        assert_eq!(sources[0].label, "Market Wire");
        assert_eq!(sources[0].item_count, 2);
        assert_eq!(sources[1].label, "Tech Ledger");
        assert!(sources[1].recommended);
        assert!(sources.iter().all(|l| l.enabled));

        let green = sources.iter().find(|l| l.label == "Green Daily").unwrap();
        assert!(!green.recommended);
    }

    #[test]
    fn disabled_label_hides_items() {
        let items = fallback_catalog();
        let mut prefs = CategoryPreferences::from_catalog(&items, "recommended");

        assert_eq!(prefs.toggle(KEYWORD_CATEGORY, "Economy"), Some(false));
        let economy = items.iter().find(|i| i.keyword == "Economy").unwrap();
        assert!(!prefs.allows(economy));

        assert_eq!(prefs.toggle(KEYWORD_CATEGORY, "Economy"), Some(true));
        assert!(prefs.allows(economy));

        assert_eq!(prefs.toggle(KEYWORD_CATEGORY, "Sports"), None);
        assert_eq!(prefs.toggle("region", "EU"), None);
    }
}
