// config.rs

use crc::{CRC_32_ISCSI, Crc};

use crate::*;

pub const NVS_BUF_SIZE: usize = 256;

const DEFAULT_API_PORT: u16 = 80;
const DEFAULT_LOCATION: &str = "Server room";

const CONFIG_NAME: &str = "cfg";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MyConfig {
    pub port: u16,

    // host our own access point instead of joining a network
    pub wifi_ap: bool,
    pub wifi_ssid: String,
    pub wifi_pass: String,

    pub location: String,
}

impl Default for MyConfig {
    fn default() -> Self {
        Self {
            port: env!("API_PORT").parse().unwrap_or(DEFAULT_API_PORT),

            wifi_ap: true,
            wifi_ssid: env!("WIFI_SSID").into(),
            wifi_pass: env!("WIFI_PASS").into(),

            location: DEFAULT_LOCATION.into(),
        }
    }
}

impl MyConfig {
    pub fn from_store(store: &mut dyn Store) -> Option<Self> {
        let mut nvsbuf = [0u8; NVS_BUF_SIZE];
        info!("Reading up to {sz} bytes from nvs...", sz = NVS_BUF_SIZE);
        let b = match store.load_raw(CONFIG_NAME, &mut nvsbuf) {
            Err(e) => {
                error!("Nvs read error {e:?}");
                return None;
            }
            Ok(Some(b)) => b,
            Ok(None) => {
                error!("Nvs key not found");
                return None;
            }
        };
        info!("Got {sz} bytes from nvs. Parsing config...", sz = b.len());

        let crc = Crc::<u32>::new(&CRC_32_ISCSI);
        let digest = crc.digest();
        match postcard::from_bytes_crc32::<MyConfig>(b, digest) {
            Ok(c) => {
                info!("Successfully parsed config from nvs.");
                Some(c)
            }
            Err(e) => {
                error!("Cannot parse config from nvs: {e:?}");
                None
            }
        }
    }

    pub fn to_store(&self, store: &mut dyn Store) -> anyhow::Result<()> {
        let mut nvsbuf = [0u8; NVS_BUF_SIZE];
        let crc = Crc::<u32>::new(&CRC_32_ISCSI);
        let digest = crc.digest();
        let nvsdata = match postcard::to_slice_crc32(self, &mut nvsbuf, digest) {
            Ok(d) => d,
            Err(e) => bail!("Cannot encode config to buffer {e:?}"),
        };
        info!(
            "Encoded config to {sz} bytes. Saving to nvs...",
            sz = nvsdata.len()
        );

        match store.store_raw(CONFIG_NAME, nvsdata) {
            Ok(_) => {
                info!("Config saved.");
                Ok(())
            }
            Err(e) => bail!("Cannot save to nvs: {e:?}"),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.port == 0 {
            bail!("API port must not be zero");
        }
        if self.wifi_ssid.is_empty() || self.wifi_ssid.len() > 32 {
            bail!("WiFi SSID must be 1..32 bytes");
        }
        // WPA2 passphrase, or empty for an open network
        if !self.wifi_pass.is_empty() && !(8..=63).contains(&self.wifi_pass.len()) {
            bail!("WiFi password must be empty or 8..63 bytes");
        }
        if self.location.len() > 64 {
            bail!("Location must be at most 64 bytes");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_read_back_from_store() {
        let mut store = MemStore::new();
        assert!(MyConfig::from_store(&mut store).is_none());

        let config = MyConfig {
            wifi_ap: false,
            location: "Lab 114".into(),
            ..Default::default()
        };
        config.to_store(&mut store).unwrap();
        assert_eq!(MyConfig::from_store(&mut store), Some(config));
    }

    #[test]
    fn corrupted_blob_is_rejected() {
        let mut store = MemStore::new();
        MyConfig::default().to_store(&mut store).unwrap();

        let mut buf = [0u8; NVS_BUF_SIZE];
        let mut blob = store.load_raw(CONFIG_NAME, &mut buf).unwrap().unwrap().to_vec();
        blob[0] ^= 0xff;
        store.store_raw(CONFIG_NAME, &blob).unwrap();
        assert!(MyConfig::from_store(&mut store).is_none());
    }

    #[test]
    fn short_wifi_password_is_invalid() {
        let config = MyConfig {
            wifi_pass: "1234".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(MyConfig::default().validate().is_ok());
    }
}

// EOF
