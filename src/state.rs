// state.rs

use std::net::Ipv4Addr;

use crate::*;

pub const REQUEST_QUEUE: usize = 4;

pub struct MyState {
    pub config: RwLock<MyConfig>,
    pub uptime: RwLock<usize>,
    pub api_cnt: AtomicU32,
    pub wifi_up: RwLock<bool>,
    pub ip_addr: RwLock<Ipv4Addr>,
    pub myid: RwLock<String>,
    pub status: RwLock<Status>,
    pub store: Mutex<Box<dyn Store + Send>>,
    pub commands: mpsc::Sender<Request>,
    pub reset: RwLock<bool>,
}

impl MyState {
    pub fn new(
        config: MyConfig,
        store: Box<dyn Store + Send>,
        commands: mpsc::Sender<Request>,
        status: Status,
    ) -> Self {
        MyState {
            config: RwLock::new(config),
            uptime: RwLock::new(0),
            api_cnt: AtomicU32::new(0),
            wifi_up: RwLock::new(false),
            ip_addr: RwLock::new(Ipv4Addr::new(0, 0, 0, 0)),
            myid: RwLock::new("esp32alarm".into()),
            status: RwLock::new(status),
            store: Mutex::new(store),
            commands,
            reset: RwLock::new(false),
        }
    }

    /// Queue a command for the control loop and wait for its answer.
    pub async fn submit(&self, command: Command) -> anyhow::Result<Reply> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Request { command, reply: tx })
            .await
            .map_err(|_| anyhow!("Control loop is not running"))?;
        Ok(rx.await?)
    }
}

// EOF
