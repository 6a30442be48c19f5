// store.rs

use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs;

use crate::*;

pub const KEY_MODE: &str = "mode";
pub const KEY_ALERTS: &str = "alerts";

/// Small key-value store surviving restarts.
pub trait Store {
    fn load(&mut self, key: &str) -> anyhow::Result<Option<u32>>;
    fn store(&mut self, key: &str, value: u32) -> anyhow::Result<()>;
    fn load_raw<'a>(&mut self, key: &str, buf: &'a mut [u8]) -> anyhow::Result<Option<&'a [u8]>>;
    fn store_raw(&mut self, key: &str, data: &[u8]) -> anyhow::Result<()>;
}

#[cfg(target_os = "espidf")]
pub struct NvsStore(pub nvs::EspNvs<nvs::NvsDefault>);

#[cfg(target_os = "espidf")]
impl Store for NvsStore {
    fn load(&mut self, key: &str) -> anyhow::Result<Option<u32>> {
        Ok(self.0.get_u32(key)?)
    }

    fn store(&mut self, key: &str, value: u32) -> anyhow::Result<()> {
        self.0.set_u32(key, value)?;
        Ok(())
    }

    fn load_raw<'a>(&mut self, key: &str, buf: &'a mut [u8]) -> anyhow::Result<Option<&'a [u8]>> {
        Ok(self.0.get_raw(key, buf)?)
    }

    fn store_raw(&mut self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        self.0.set_raw(key, data)?;
        Ok(())
    }
}

/// In-memory store for host builds and tests.
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    values: HashMap<String, u32>,
    blobs: HashMap<String, Vec<u8>>,
    pub writes: usize,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn load(&mut self, key: &str) -> anyhow::Result<Option<u32>> {
        Ok(self.values.get(key).copied())
    }

    fn store(&mut self, key: &str, value: u32) -> anyhow::Result<()> {
        self.writes += 1;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn load_raw<'a>(&mut self, key: &str, buf: &'a mut [u8]) -> anyhow::Result<Option<&'a [u8]>> {
        match self.blobs.get(key) {
            None => Ok(None),
            Some(b) if b.len() > buf.len() => {
                bail!("Blob {key} does not fit in {} bytes", buf.len())
            }
            Some(b) => {
                buf[..b.len()].copy_from_slice(b);
                Ok(Some(&buf[..b.len()]))
            }
        }
    }

    fn store_raw(&mut self, key: &str, data: &[u8]) -> anyhow::Result<()> {
        self.writes += 1;
        self.blobs.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

/// The only state that survives a restart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    pub alerts: u32,
}

impl Settings {
    pub fn load(store: &mut dyn Store) -> Self {
        let mode = match store.load(KEY_MODE) {
            Ok(Some(1)) => Mode::Demo,
            Ok(_) => Mode::Real,
            Err(e) => {
                error!("Cannot read {KEY_MODE} from store: {e:?}");
                Mode::Real
            }
        };
        let alerts = match store.load(KEY_ALERTS) {
            Ok(v) => v.unwrap_or(0),
            Err(e) => {
                error!("Cannot read {KEY_ALERTS} from store: {e:?}");
                0
            }
        };
        info!("Loaded settings: mode {mode:?}, {alerts} alerts so far");
        Settings { mode, alerts }
    }

    pub fn set_mode(&mut self, store: &mut dyn Store, mode: Mode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        persist(store, KEY_MODE, u32::from(mode == Mode::Demo));
    }

    pub fn count_alert(&mut self, store: &mut dyn Store) {
        self.alerts = self.alerts.wrapping_add(1);
        persist(store, KEY_ALERTS, self.alerts);
    }
}

// a failed write keeps the value in memory until the next change
fn persist(store: &mut dyn Store, key: &str, value: u32) {
    match store.store(key, value) {
        Ok(()) => info!("Stored {key}={value}"),
        Err(e) => error!("Cannot store {key}={value}: {e:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_gives_defaults() {
        let mut store = MemStore::new();
        assert_eq!(Settings::load(&mut store), Settings::default());
    }

    #[test]
    fn settings_survive_reload() {
        let mut store = MemStore::new();
        let mut s = Settings::load(&mut store);
        s.set_mode(&mut store, Mode::Demo);
        s.count_alert(&mut store);
        s.count_alert(&mut store);

        let reloaded = Settings::load(&mut store);
        assert_eq!(reloaded.mode, Mode::Demo);
        assert_eq!(reloaded.alerts, 2);
    }

    #[test]
    fn unchanged_mode_is_not_written() {
        let mut store = MemStore::new();
        let mut s = Settings::default();
        s.set_mode(&mut store, Mode::Real);
        assert_eq!(store.writes, 0);
        s.set_mode(&mut store, Mode::Demo);
        s.set_mode(&mut store, Mode::Demo);
        assert_eq!(store.writes, 1);
    }

    #[test]
    fn oversized_blob_is_an_error() {
        let mut store = MemStore::new();
        store.store_raw("cfg", &[1, 2, 3, 4]).unwrap();
        let mut small = [0u8; 2];
        assert!(store.load_raw("cfg", &mut small).is_err());
    }
}

// EOF
