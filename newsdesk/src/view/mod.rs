//! Pure derivation of the rendered list from the catalog and the view state.

use chrono::NaiveDate;
use std::cmp::Ordering;

use crate::models::{InsightComment, InsightMetric, NewsItem};
use crate::state::{InsightState, Tab, ViewState};

pub mod preferences;

pub use preferences::{CategoryPreferences, PreferenceLabel};

pub const DEFAULT_PAGE_SIZE: usize = 3;
pub const DEFAULT_RECOMMENDED_TAG: &str = "recommended";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSettings {
    /// Items shown per date group initially, and added per "show more"
    pub page_size: usize,
    pub recommended_tag: String,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            recommended_tag: DEFAULT_RECOMMENDED_TAG.to_string(),
        }
    }
}

/// One news item with everything the UI shows next to it.
#[derive(Debug, Clone)]
pub struct RenderedItem {
    pub item: NewsItem,
    pub bookmarked: bool,
    pub insight: InsightState,
    pub metric: InsightMetric,
    pub comments: Vec<InsightComment>,
    pub composing: bool,
}

#[derive(Debug, Clone)]
pub struct DateGroup {
    pub date: String,
    /// Items in the group after filtering
    pub total: usize,
    pub items: Vec<RenderedItem>,
}

impl DateGroup {
    pub fn visible(&self) -> usize {
        self.items.len()
    }

    pub fn has_more(&self) -> bool {
        self.items.len() < self.total
    }
}

#[derive(Debug, Clone)]
pub struct RenderedView {
    pub tab: Tab,
    /// Empty on the management tab
    pub groups: Vec<DateGroup>,
    pub banner: Option<String>,
    pub error: Option<String>,
}

/// Derive the list for the active tab.
pub fn derive(catalog: &[NewsItem], state: &ViewState, settings: &ViewSettings) -> RenderedView {
    let groups = if state.tab == Tab::Management {
        Vec::new()
    } else {
        let filtered = filter_items(catalog, state, settings);
        group_by_date(filtered)
            .into_iter()
            .map(|(date, items)| {
                let total = items.len();
                let shown = visible_count(total, state.visible.get(&date).copied(), settings.page_size);
                let items = items
                    .into_iter()
                    .take(shown)
                    .map(|item| render_item(item, state))
                    .collect();
                DateGroup { date, total, items }
            })
            .collect()
    };

    RenderedView {
        tab: state.tab,
        groups,
        banner: state.banner.clone(),
        error: state.error.clone(),
    }
}

/// Items of the active tab that pass the category preferences, in catalog order.
pub fn filter_items<'a>(catalog: &'a [NewsItem], state: &ViewState, settings: &ViewSettings) -> Vec<&'a NewsItem> {
    catalog
        .iter()
        .filter(|item| match state.tab {
            Tab::All => true,
            Tab::Recommended => item.has_tag(&settings.recommended_tag),
            Tab::Bookmarks => state.is_bookmarked(&item.id),
            Tab::Management => false,
        })
        .filter(|item| state.preferences.allows(item))
        .collect()
}

/// Group by date, newest first. Unparseable dates sort after real ones.
pub fn group_by_date<'a>(items: Vec<&'a NewsItem>) -> Vec<(String, Vec<&'a NewsItem>)> {
    let mut groups: Vec<(String, Vec<&'a NewsItem>)> = Vec::new();
    for item in items {
        match groups.iter_mut().find(|(date, _)| *date == item.date) {
            Some((_, members)) => members.push(item),
            None => groups.push((item.date.clone(), vec![item])),
        }
    }
    groups.sort_by(|(a, _), (b, _)| compare_dates_desc(a, b));
    groups
}

fn compare_dates_desc(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
    match (parse(a), parse(b)) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.cmp(a),
    }
}

/// Reveal one more page of the `date` group of the active tab. The stored counter never
/// exceeds the number of items the group currently holds; unknown dates are left alone.
pub fn show_more(catalog: &[NewsItem], state: &mut ViewState, settings: &ViewSettings, date: &str) {
    let total = filter_items(catalog, state, settings)
        .iter()
        .filter(|item| item.date == date)
        .count();
    if total == 0 {
        return;
    }
    let shown = visible_count(total, state.visible.get(date).copied(), settings.page_size);
    state
        .visible
        .insert(date.to_string(), (shown + settings.page_size).min(total));
}

/// Items to show for a group of `total`, given its "show more" counter.
pub fn visible_count(total: usize, counter: Option<usize>, page_size: usize) -> usize {
    counter.unwrap_or(page_size).min(total)
}

fn render_item(item: &NewsItem, state: &ViewState) -> RenderedItem {
    RenderedItem {
        item: item.clone(),
        bookmarked: state.is_bookmarked(&item.id),
        insight: state.insight(&item.id),
        metric: state.metric(&item.id),
        comments: state.comments_for(&item.id),
        composing: state.composing.contains(&item.id),
    }
}
