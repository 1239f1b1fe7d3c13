// SPDX-License-Identifier: MPL-2.0

mod client;
mod fixtures;
mod source;
mod types;

pub use client::{ClientError, RemoteDataSource};
pub use fixtures::FixtureDataSource;
pub use source::DataSource;
pub use types::{
    AdvancedFilter, DateRange, NewStory, Session, SortBy, StoryRecord, User, day_end, day_start,
};
