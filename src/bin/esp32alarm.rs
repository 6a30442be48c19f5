// bin/esp32alarm.rs

#![warn(clippy::large_futures)]

#[cfg(target_os = "espidf")]
use esp32alarm::*;
#[cfg(target_os = "espidf")]
use esp_idf_hal::{
    delay::FreeRtos,
    gpio::{AnyInputPin, AnyIOPin, IOPin, Input, InputPin, OutputPin, PinDriver},
    peripherals::Peripherals,
    uart::{self, UartDriver},
    units::Hertz,
};
#[cfg(target_os = "espidf")]
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs, timer::EspTaskTimerService, wifi::WifiDriver};
#[cfg(target_os = "espidf")]
use esp_idf_sys::esp;

// holding BOOT for this many half seconds restores the factory config
#[cfg(target_os = "espidf")]
const CONFIG_RESET_COUNT: i32 = 9;

#[cfg(target_os = "espidf")]
esp_idf_sys::esp_app_desc!();

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!(
        "{} only runs on ESP-IDF targets. Use `cargo test` for the alarm logic on the host.",
        env!("CARGO_BIN_NAME")
    );
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    // eventfd is needed by our mio poll implementation.  Note you should set max_fds
    // higher if you have other code that may need eventfd.
    #[allow(clippy::needless_update)]
    let config = esp_idf_sys::esp_vfs_eventfd_config_t {
        max_fds: 1,
        ..Default::default()
    };
    esp! { unsafe { esp_idf_sys::esp_vfs_eventfd_register(&config) } }?;

    info!("Hello.");
    info!("Starting up, firmware v{FW_VERSION}.");

    let sysloop = EspSystemEventLoop::take()?;
    let timer = EspTaskTimerService::new()?;
    let nvs_default_partition = nvs::EspDefaultNvsPartition::take()?;

    let ns = env!("CARGO_BIN_NAME");
    let mut store = match nvs::EspNvs::new(nvs_default_partition.clone(), ns, true) {
        Ok(nvs) => {
            info!("Got namespace {ns:?} from default partition");
            NvsStore(nvs)
        }
        Err(e) => panic!("Could not get namespace {ns}: {e:?}"),
    };

    #[cfg(feature = "reset_settings")]
    let config = {
        let c = MyConfig::default();
        c.to_store(&mut store)?;
        c
    };

    #[cfg(not(feature = "reset_settings"))]
    let config = match MyConfig::from_store(&mut store) {
        None => {
            error!("Could not read nvs config, using defaults");
            let c = MyConfig::default();
            c.to_store(&mut store)?;
            info!("Successfully saved default config to nvs.");
            c
        }

        // using settings saved on nvs if we could find them
        Some(c) => c,
    };
    info!("My config:\n{config:#?}");

    let monitor = Monitor::boot(&mut store, &config.location);

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    #[cfg(feature = "esp32c3")]
    let (button, sensor_pin, leds, buzzer, modem_tx, modem_rx) = (
        pins.gpio9.downgrade_input(),
        pins.gpio2,
        [
            pins.gpio5.downgrade_output(),
            pins.gpio6.downgrade_output(),
            pins.gpio7.downgrade_output(),
        ],
        pins.gpio10.downgrade_output(),
        pins.gpio0.downgrade(),
        pins.gpio1.downgrade(),
    );

    #[cfg(feature = "esp32s")]
    let (button, sensor_pin, leds, buzzer, modem_tx, modem_rx) = (
        pins.gpio0.downgrade_input(),
        pins.gpio34,
        [
            pins.gpio25.downgrade_output(),
            pins.gpio26.downgrade_output(),
            pins.gpio27.downgrade_output(),
        ],
        pins.gpio32.downgrade_output(),
        pins.gpio17.downgrade(),
        pins.gpio16.downgrade(),
    );

    let button = PinDriver::input(button)?;

    let uart = UartDriver::new(
        peripherals.uart1,
        modem_tx,
        modem_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::config::Config::new().baudrate(Hertz(MODEM_BAUD)),
    )?;
    let board = Board::new(peripherals.adc1, sensor_pin, leds, buzzer, uart)?;

    let wifidriver = WifiDriver::new(
        peripherals.modem,
        sysloop.clone(),
        Some(nvs_default_partition),
    )?;

    let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
    let state = Box::pin(MyState::new(config, Box::new(store), tx, monitor.status(0)));
    let shared_state = Arc::new(state);

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(Box::pin(async move {
            let wifi_loop = WifiLoop {
                state: shared_state.clone(),
                wifi: None,
            };

            info!("Entering main loop...");
            tokio::select! {
                _ = Box::pin(poll_reset(shared_state.clone(), button)) => { error!("poll_reset() ended."); }
                _ = Box::pin(run_monitor(shared_state.clone(), monitor, board, rx)) => { error!("run_monitor() ended."); }
                _ = Box::pin(run_api_server(shared_state.clone())) => { error!("run_api_server() ended."); }
                _ = Box::pin(wifi_loop.run(wifidriver, sysloop, timer)) => { error!("wifi_loop.run() ended."); }
            };
        }));

    // not actually returning from main() but we reboot instead
    info!("main() finished, reboot.");
    FreeRtos::delay_ms(3000);
    esp_idf_hal::reset::restart();
}

#[cfg(target_os = "espidf")]
async fn poll_reset(
    mut state: Arc<Pin<Box<MyState>>>,
    button: PinDriver<'_, AnyInputPin, Input>,
) -> anyhow::Result<()> {
    let mut uptime: usize = 0;
    loop {
        sleep(Duration::from_secs(2)).await;

        uptime += 2;
        *(state.uptime.write().await) = uptime;

        if *state.reset.read().await {
            info!("Restarting as requested.");
            sleep(Duration::from_millis(500)).await;
            esp_idf_hal::reset::restart();
        }

        if button.is_low() {
            Box::pin(reset_button(&mut state, &button)).await?;
        }
    }
}

#[cfg(target_os = "espidf")]
async fn reset_button(
    state: &mut Arc<Pin<Box<MyState>>>,
    button: &PinDriver<'_, AnyInputPin, Input>,
) -> anyhow::Result<()> {
    let mut reset_cnt = CONFIG_RESET_COUNT;

    while button.is_low() {
        // button is pressed and kept down, countdown and factory reset if reach zero
        error!("Reset? {reset_cnt}");

        if reset_cnt == 0 {
            error!("Factory resetting...");

            let new_config = MyConfig::default();
            new_config.to_store(&mut **state.store.lock().await)?;
            sleep(Duration::from_millis(2000)).await;
            esp_idf_hal::reset::restart();
        }

        reset_cnt -= 1;
        sleep(Duration::from_millis(500)).await;
    }
    Ok(())
}

// EOF
