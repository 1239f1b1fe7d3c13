// SPDX-License-Identifier: MPL-2.0

mod app_state;
mod connectivity;
mod session;
pub mod settings;

pub use app_state::{AppState, Notice};
pub use connectivity::ConnectivityMonitor;
pub use session::{
    FileSessionStore, KeyringSessionStore, SessionError, SessionStore, open_store,
};
pub use settings::{AppSettings, SessionBackend};
