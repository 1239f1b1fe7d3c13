// SPDX-License-Identifier: MPL-2.0

use crate::api::StoryRecord;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationCount {
    /// Spelling of the first story that mentioned the place
    pub name: String,
    pub stories: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthCount {
    pub year: i32,
    pub month: u32,
    pub stories: usize,
}

/// Summary figures for the analytics view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryStats {
    pub total: usize,
    pub favourites: usize,
    pub on_profile: usize,
    /// Most visited first, ties by name
    pub locations: Vec<LocationCount>,
    /// Chronological
    pub per_month: Vec<MonthCount>,
    pub first_visit: Option<NaiveDate>,
    pub last_visit: Option<NaiveDate>,
}

impl StoryStats {
    pub fn from_stories(stories: &[StoryRecord]) -> Self {
        let mut locations: HashMap<String, LocationCount> = HashMap::new();
        let mut months: BTreeMap<(i32, u32), usize> = BTreeMap::new();

        for story in stories {
            // A place listed twice in one story still counts once for it
            let mut seen_here = Vec::new();
            for place in &story.visited_location {
                let key = place.trim().to_lowercase();
                if key.is_empty() || seen_here.contains(&key) {
                    continue;
                }
                locations
                    .entry(key.clone())
                    .or_insert_with(|| LocationCount {
                        name: place.trim().to_string(),
                        stories: 0,
                    })
                    .stories += 1;
                seen_here.push(key);
            }

            *months
                .entry((story.visited_date.year(), story.visited_date.month()))
                .or_default() += 1;
        }

        let mut locations: Vec<LocationCount> = locations.into_values().collect();
        locations.sort_by(|a, b| b.stories.cmp(&a.stories).then_with(|| a.name.cmp(&b.name)));

        Self {
            total: stories.len(),
            favourites: stories.iter().filter(|s| s.is_favourite).count(),
            on_profile: stories.iter().filter(|s| s.show_on_profile).count(),
            locations,
            per_month: months
                .into_iter()
                .map(|((year, month), stories)| MonthCount {
                    year,
                    month,
                    stories,
                })
                .collect(),
            first_visit: stories.iter().map(|s| s.visited_date).min(),
            last_visit: stories.iter().map(|s| s.visited_date).max(),
        }
    }
}
