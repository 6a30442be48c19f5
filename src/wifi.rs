// wifi.rs

use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::{
    eventloop::{EspEventLoop, System},
    ipv4,
    netif::{self, EspNetif},
    timer::{EspTimerService, Task},
    wifi::{AsyncWifi, EspWifi, WifiDriver},
};

use crate::*;

pub struct WifiLoop<'a> {
    pub state: Arc<Pin<Box<MyState>>>,
    pub wifi: Option<AsyncWifi<EspWifi<'a>>>,
}

impl<'a> WifiLoop<'a> {
    pub async fn run(
        mut self,
        wifidriver: WifiDriver<'a>,
        sysloop: EspEventLoop<System>,
        timer: EspTimerService<Task>,
    ) -> anyhow::Result<()> {
        info!("Initializing Wi-Fi...");

        let sta_netif = EspNetif::new_with_conf(&netif::NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Client(
                ipv4::ClientConfiguration::DHCP(ipv4::DHCPClientSettings::default()),
            )),
            ..netif::NetifConfiguration::wifi_default_client()
        })?;

        let mac = sta_netif.get_mac()?;
        *self.state.myid.write().await = format!(
            "esp32alarm-{:02X}{:02X}{:02X}",
            mac[3], mac[4], mac[5],
        );

        let ap_netif = EspNetif::new(netif::NetifStack::Ap)?;
        let espwifi = EspWifi::wrap_all(wifidriver, sta_netif, ap_netif)?;
        self.wifi = Some(AsyncWifi::wrap(espwifi, sysloop, timer)?);

        let access_point = self.state.config.read().await.wifi_ap;
        Box::pin(self.configure(access_point)).await?;

        if access_point {
            return self.serve_access_point().await;
        }

        if let Err(e) = Box::pin(self.initial_connect()).await {
            error!("WiFi connection failed: {e:?}");
            error!("Resetting...");
            sleep(Duration::from_secs(5)).await;
            esp_idf_hal::reset::restart();
        }

        let ip_info = self.wifi()?.wifi().sta_netif().get_ip_info()?;
        info!("WiFi station address {}", ip_info.ip);
        *self.state.ip_addr.write().await = ip_info.ip;
        *self.state.wifi_up.write().await = true;

        self.stay_connected().await
    }

    fn wifi(&mut self) -> anyhow::Result<&mut AsyncWifi<EspWifi<'a>>> {
        self.wifi.as_mut().ok_or_else(|| anyhow!("WiFi not initialized"))
    }

    pub async fn configure(&mut self, access_point: bool) -> anyhow::Result<()> {
        let (ssid, pass) = {
            let config = self.state.config.read().await;
            (config.wifi_ssid.clone(), config.wifi_pass.clone())
        };
        let auth_method = if pass.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let ssid = ssid.as_str().try_into().map_err(|_| anyhow!("WiFi SSID too long"))?;
        let password = pass.as_str().try_into().map_err(|_| anyhow!("WiFi password too long"))?;

        let configuration = if access_point {
            info!("WiFi setting up access point...");
            Configuration::AccessPoint(AccessPointConfiguration {
                ssid,
                password,
                auth_method,
                channel: 1,
                ..Default::default()
            })
        } else {
            info!("WiFi setting credentials...");
            Configuration::Client(ClientConfiguration {
                ssid,
                password,
                ..Default::default()
            })
        };

        let wifi = self.wifi()?;
        wifi.set_configuration(&configuration)?;
        info!("WiFi driver starting...");
        Ok(Box::pin(wifi.start()).await?)
    }

    async fn serve_access_point(mut self) -> anyhow::Result<()> {
        let wifi = self.wifi()?;
        Box::pin(wifi.wait_netif_up()).await?;
        let ip_info = wifi.wifi().ap_netif().get_ip_info()?;
        info!("WiFi access point up at {}", ip_info.ip);
        *self.state.ip_addr.write().await = ip_info.ip;
        *self.state.wifi_up.write().await = true;

        // nothing to maintain, the driver keeps the AP running
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    pub async fn initial_connect(&mut self) -> anyhow::Result<()> {
        self.do_connect_loop(true).await
    }

    pub async fn stay_connected(mut self) -> anyhow::Result<()> {
        self.do_connect_loop(false).await
    }

    async fn do_connect_loop(&mut self, initial: bool) -> anyhow::Result<()> {
        let wifi = self.wifi()?;
        loop {
            // Wait for disconnect before trying to connect again.
            let timeout = if initial {
                Some(Duration::from_secs(30))
            } else {
                None
            };
            Box::pin(wifi.wifi_wait(|w| w.is_up(), timeout)).await.ok();

            info!("WiFi connecting...");
            Box::pin(wifi.connect()).await.ok();

            info!("WiFi waiting for association...");
            match Box::pin(wifi.ip_wait_while(|w| w.is_up().map(|s| !s), None)).await {
                Ok(_) => {}
                Err(e) => {
                    error!("WiFi error: {e:?}");

                    // only exit here if this is initial connection
                    // otherwise, keep trying
                    if initial {
                        bail!(e);
                    }
                }
            }

            info!("WiFi connected.");
            if initial {
                return Ok(());
            }
        }
    }
}

// EOF
