// SPDX-License-Identifier: MPL-2.0

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A travel story as the service stores it. Also the row shape of the local
/// cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    pub story: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub visited_location: Vec<String>,
    #[serde(with = "visited_date")]
    pub visited_date: NaiveDate,
    pub created_on: DateTime<Utc>,
    #[serde(default)]
    pub is_favourite: bool,
    #[serde(default)]
    pub show_on_profile: bool,
}

/// Editable fields of a story, sent on create and edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStory {
    pub title: String,
    pub story: String,
    pub image_url: String,
    pub visited_location: Vec<String>,
    #[serde(with = "visited_date")]
    pub visited_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id", default)]
    pub id: String,
    pub full_name: String,
    pub email: String,
}

/// Bearer credential handed out at sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user: User,
}

/// Sort modes understood by the advanced search, both remotely and offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    #[serde(rename = "newest")]
    Newest,
    #[serde(rename = "oldest")]
    Oldest,
    #[serde(rename = "a-z")]
    TitleAsc,
    #[serde(rename = "z-a")]
    TitleDesc,
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(Self::Newest),
            "oldest" => Ok(Self::Oldest),
            "a-z" => Ok(Self::TitleAsc),
            "z-a" => Ok(Self::TitleDesc),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// Optional bounds on `visitedDate`, both inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(default, with = "start_bound")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, with = "end_bound")]
    pub end_date: Option<NaiveDate>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start_date.is_none() && self.end_date.is_none()
    }
}

/// Criteria for the advanced search. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedFilter {
    pub title: Option<String>,
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    pub is_favourite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
}

/// Start of day, millisecond precision, as the service expects range bounds.
pub fn day_start(date: NaiveDate) -> String {
    format_bound(date, NaiveTime::MIN)
}

/// Last millisecond of the day so the range covers the whole end date.
pub fn day_end(date: NaiveDate) -> String {
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
    format_bound(date, end)
}

fn format_bound(date: NaiveDate, time: NaiveTime) -> String {
    date.and_time(time)
        .and_utc()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Accepts either a plain date or a full timestamp; the service has sent both.
fn parse_visited_date(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

mod visited_date {
    use super::*;

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        parse_visited_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid visited date: {raw}")))
    }
}

mod start_bound {
    use super::*;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => s.serialize_str(&day_start(*date)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        optional_date(d)
    }
}

mod end_bound {
    use super::*;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => s.serialize_str(&day_end(*date)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        optional_date(d)
    }
}

fn optional_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_visited_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date bound: {raw}"))),
    }
}
