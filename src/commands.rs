use std::sync::Arc;

use crate::config::SettingsStore;
use crate::log_store::LogStore;
use crate::scheduler::Scheduler;

mod config_cmds;
mod watcher_cmds;

pub use config_cmds::*;
pub use watcher_cmds::*;

pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub log: Arc<LogStore>,
    pub scheduler: Scheduler,
}
