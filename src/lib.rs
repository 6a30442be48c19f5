// lib.rs
#![warn(clippy::large_futures)]

pub use std::{
    net,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

pub use anyhow::{anyhow, bail};
pub use log::*;
pub use serde::{Deserialize, Serialize};
pub use tokio::{
    sync::{Mutex, RwLock, mpsc, oneshot},
    time::{Duration, sleep},
};

mod config;
pub use config::*;

mod store;
pub use store::*;

mod measure;
pub use measure::*;

mod alert;
pub use alert::*;

mod modem;
pub use modem::*;

mod monitor;
pub use monitor::*;

mod state;
pub use state::*;

mod apiserver;
pub use apiserver::*;

#[cfg(target_os = "espidf")]
mod board;
#[cfg(target_os = "espidf")]
pub use board::*;

#[cfg(target_os = "espidf")]
mod wifi;
#[cfg(target_os = "espidf")]
pub use wifi::*;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, Serialize)]
pub struct Uptime {
    pub uptime: usize,
    pub uptime_s: String,
}

impl Uptime {
    pub fn new(uptime: usize) -> Self {
        let (d, rem) = (uptime / 86400, uptime % 86400);
        let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
        Uptime {
            uptime,
            uptime_s: format!("{d}d {h:02}:{m:02}:{s:02}"),
        }
    }
}


// EOF
