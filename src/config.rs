// SPDX-License-Identifier: MPL-2.0

pub const APP_ID: &str = "io.github.sethcottle.TravelBook";
pub const APP_NAME: &str = "Travel Book";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Remote calls fail as network errors after this many seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
