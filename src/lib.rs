// SPDX-License-Identifier: MPL-2.0

//! Client core for Travel Book: an offline story cache, a query layer that
//! answers the same way online and offline, and refetch-on-reconnect.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod query;
pub mod runtime;
pub mod state;
pub mod sync;

pub use app::TravelBookApp;
