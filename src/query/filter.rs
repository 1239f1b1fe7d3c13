// SPDX-License-Identifier: MPL-2.0

//! Offline query semantics.
//!
//! These functions answer the same questions as the remote search endpoints,
//! but over a slice of cached records. The fixture backend reuses them so both
//! paths stay equivalent.

use crate::api::{AdvancedFilter, SortBy, StoryRecord};
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Case-insensitive substring match against title, narrative and every visited
/// location.
/// Surrounding whitespace in the query is ignored.
pub fn matches_text(story: &StoryRecord, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    contains(&story.title, &needle)
        || contains(&story.story, &needle)
        || story
            .visited_location
            .iter()
            .any(|location| contains(location, &needle))
}

pub fn search(stories: Vec<StoryRecord>, query: &str) -> Vec<StoryRecord> {
    stories
        .into_iter()
        .filter(|story| matches_text(story, query))
        .collect()
}

/// Inclusive on both ends; a missing bound does not constrain.
pub fn in_date_range(story: &StoryRecord, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
    from.is_none_or(|from| story.visited_date >= from)
        && to.is_none_or(|to| story.visited_date <= to)
}

pub fn by_date_range(stories: Vec<StoryRecord>, from: NaiveDate, to: NaiveDate) -> Vec<StoryRecord> {
    stories
        .into_iter()
        .filter(|story| in_date_range(story, Some(from), Some(to)))
        .collect()
}

/// All criteria must hold. Empty strings are treated as unset.
pub fn matches_filter(story: &StoryRecord, filter: &AdvancedFilter) -> bool {
    if let Some(title) = non_empty(&filter.title)
        && !contains(&story.title, &title.to_lowercase())
    {
        return false;
    }

    if let Some(location) = non_empty(&filter.location) {
        let needle = location.to_lowercase();
        if !story.visited_location.iter().any(|l| contains(l, &needle)) {
            return false;
        }
    }

    if let Some(favourite) = filter.is_favourite
        && story.is_favourite != favourite
    {
        return false;
    }

    match &filter.date_range {
        Some(range) => in_date_range(story, range.start_date, range.end_date),
        None => true,
    }
}

/// Filter then sort. Without a sort mode the default order applies.
pub fn advanced(stories: Vec<StoryRecord>, filter: &AdvancedFilter) -> Vec<StoryRecord> {
    let mut matched: Vec<StoryRecord> = stories
        .into_iter()
        .filter(|story| matches_filter(story, filter))
        .collect();
    sort(&mut matched, filter.sort_by);
    matched
}

pub fn sort(stories: &mut [StoryRecord], sort_by: Option<SortBy>) {
    match sort_by {
        Some(SortBy::Newest) => stories.sort_by(|a, b| b.visited_date.cmp(&a.visited_date)),
        Some(SortBy::Oldest) => stories.sort_by(|a, b| a.visited_date.cmp(&b.visited_date)),
        Some(SortBy::TitleAsc) => stories.sort_by(|a, b| compare_titles(a, b)),
        Some(SortBy::TitleDesc) => stories.sort_by(|a, b| compare_titles(b, a)),
        None => sort_default(stories),
    }
}

/// Favourites first, then most recently visited.
pub fn sort_default(stories: &mut [StoryRecord]) {
    stories.sort_by(|a, b| {
        b.is_favourite
            .cmp(&a.is_favourite)
            .then_with(|| b.visited_date.cmp(&a.visited_date))
    });
}

fn compare_titles(a: &StoryRecord, b: &StoryRecord) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.title.cmp(&b.title))
}

fn contains(haystack: &str, lowercase_needle: &str) -> bool {
    haystack.to_lowercase().contains(lowercase_needle)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::DateRange;
    use chrono::{TimeZone, Utc};

    pub(crate) fn story(id: &str, title: &str, date: (i32, u32, u32), favourite: bool) -> StoryRecord {
        StoryRecord {
            id: id.to_string(),
            title: title.to_string(),
            story: String::new(),
            image_url: String::new(),
            visited_location: Vec::new(),
            visited_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            created_on: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            is_favourite: favourite,
            show_on_profile: false,
        }
    }

    fn ids(stories: &[StoryRecord]) -> Vec<&str> {
        stories.iter().map(|s| s.id.as_str()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_search_matches_title_story_and_locations() {
        let mut paris = story("1", "Paris Trip", (2024, 1, 1), false);
        paris.story = "...".to_string();
        paris.visited_location = vec!["Paris".into(), "Lyon".into()];
        let mut tokyo = story("2", "Tokyo", (2024, 2, 1), false);
        tokyo.story = "saw Paris Hilton interview".to_string();
        tokyo.visited_location = vec!["Tokyo".into()];
        let mut rome = story("3", "Rome", (2024, 3, 1), false);
        rome.visited_location = vec!["Rome".into()];

        let found = search(vec![paris, tokyo, rome], "paris");
        assert_eq!(ids(&found), vec!["1", "2"]);
    }

    #[test]
    fn test_search_location_only_match() {
        let mut lyon = story("1", "Food tour", (2024, 1, 1), false);
        lyon.visited_location = vec!["LYON".into()];
        assert!(matches_text(&lyon, "lyon"));
        assert!(matches_text(&lyon, " lyon\t"));
        assert!(!matches_text(&lyon, "paris"));
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let stories = vec![
            story("fav-in", "A", (2024, 5, 10), true),
            story("fav-out", "B", (2023, 5, 10), true),
            story("plain-in", "C", (2024, 5, 11), false),
        ];
        let filter = AdvancedFilter {
            is_favourite: Some(true),
            date_range: Some(DateRange {
                start_date: Some(date(2024, 1, 1)),
                end_date: Some(date(2024, 12, 31)),
            }),
            ..Default::default()
        };

        assert_eq!(ids(&advanced(stories, &filter)), vec!["fav-in"]);
    }

    #[test]
    fn test_empty_filter_returns_everything_in_default_order() {
        let stories = vec![
            story("old", "A", (2022, 1, 1), false),
            story("new", "B", (2024, 1, 1), false),
            story("fav-old", "C", (2021, 1, 1), true),
            story("fav-new", "D", (2023, 1, 1), true),
        ];

        let result = advanced(stories, &AdvancedFilter::default());
        assert_eq!(ids(&result), vec!["fav-new", "fav-old", "new", "old"]);
    }

    #[test]
    fn test_blank_text_criteria_do_not_constrain() {
        let filter = AdvancedFilter {
            title: Some("   ".into()),
            location: Some(String::new()),
            ..Default::default()
        };
        assert!(matches_filter(&story("1", "x", (2024, 1, 1), false), &filter));
    }

    #[test]
    fn test_location_filter_requires_a_matching_entry() {
        let mut s = story("1", "Alps", (2024, 1, 1), false);
        s.visited_location = vec!["Zermatt".into(), "Chamonix".into()];
        let hit = AdvancedFilter {
            location: Some("chamo".into()),
            ..Default::default()
        };
        let miss = AdvancedFilter {
            location: Some("alps".into()),
            ..Default::default()
        };
        assert!(matches_filter(&s, &hit));
        assert!(!matches_filter(&s, &miss));
    }

    #[test]
    fn test_date_range_includes_both_endpoints() {
        let stories = vec![
            story("before", "a", (2024, 2, 29), false),
            story("from", "b", (2024, 3, 1), false),
            story("mid", "c", (2024, 3, 15), false),
            story("to", "d", (2024, 3, 31), false),
            story("after", "e", (2024, 4, 1), false),
        ];

        let result = by_date_range(stories, date(2024, 3, 1), date(2024, 3, 31));
        assert_eq!(ids(&result), vec!["from", "mid", "to"]);
    }

    #[test]
    fn test_title_sorts() {
        let stories = vec![
            story("b", "Banana Trip", (2024, 1, 1), false),
            story("a", "Apple Trip", (2024, 1, 2), false),
        ];

        let mut asc = stories.clone();
        sort(&mut asc, Some(SortBy::TitleAsc));
        assert_eq!(ids(&asc), vec!["a", "b"]);

        let mut desc = stories;
        sort(&mut desc, Some(SortBy::TitleDesc));
        assert_eq!(ids(&desc), vec!["b", "a"]);
    }

    #[test]
    fn test_title_sort_ignores_case() {
        let mut stories = vec![
            story("z", "zebra", (2024, 1, 1), false),
            story("a", "Antelope", (2024, 1, 1), false),
        ];
        sort(&mut stories, Some(SortBy::TitleAsc));
        assert_eq!(ids(&stories), vec!["a", "z"]);
    }

    #[test]
    fn test_date_sorts() {
        let stories = vec![
            story("mid", "a", (2024, 6, 1), true),
            story("old", "b", (2020, 1, 1), false),
            story("new", "c", (2025, 1, 1), false),
        ];

        let mut newest = stories.clone();
        sort(&mut newest, Some(SortBy::Newest));
        assert_eq!(ids(&newest), vec!["new", "mid", "old"]);

        let mut oldest = stories;
        sort(&mut oldest, Some(SortBy::Oldest));
        assert_eq!(ids(&oldest), vec!["old", "mid", "new"]);
    }
}
