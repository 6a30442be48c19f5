// apiserver.rs

use askama::Template;
use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Response, StatusCode, header},
    response::{Html, IntoResponse},
    routing::*,
};

use crate::*;

#[derive(Template)]
#[template(path = "index.html.ask", escape = "html")]
pub struct IndexPage {
    pub myid: String,
    pub ip_addr: String,
    pub location: String,
    pub limit: String,
    pub version: &'static str,
}

pub fn api_router(state: Arc<Pin<Box<MyState>>>) -> Router {
    Router::new()
        .route("/", get(get_index))
        .route("/data", get(get_data))
        .route("/demo", get(toggle_demo).post(toggle_demo))
        .route("/cancel", get(cancel_call).post(cancel_call))
        .route("/reset", get(reset_device).post(reset_device))
        .route("/uptime", get(get_uptime))
        .route(
            "/config",
            get(get_config).post(post_config).options(options),
        )
        .route("/reset_config", get(reset_config))
        .with_state(state)
}

pub async fn run_api_server(state: Arc<Pin<Box<MyState>>>) -> anyhow::Result<()> {
    loop {
        if *state.wifi_up.read().await {
            break;
        }
        sleep(Duration::from_secs(1)).await;
    }

    let listen = format!("0.0.0.0:{}", state.config.read().await.port);
    let addr = listen.parse::<net::SocketAddr>()?;
    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening to {listen}");
    Ok(axum::serve(listener, app.into_make_service()).await?)
}

pub async fn options(State(state): State<Arc<Pin<Box<MyState>>>>) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} options()");

    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "get,post"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "content-type"),
        ],
    )
        .into_response()
}

pub async fn get_index(State(state): State<Arc<Pin<Box<MyState>>>>) -> Response<Body> {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_index()");

    let page = IndexPage {
        myid: state.myid.read().await.clone(),
        ip_addr: state.ip_addr.read().await.to_string(),
        location: state.config.read().await.location.clone(),
        limit: format!("{ALERT_LIMIT:.1}"),
        version: FW_VERSION,
    };
    match page.render() {
        Ok(s) => (StatusCode::OK, Html(s)).into_response(),
        Err(e) => {
            let err_msg = format!("Index template error: {e:?}\n");
            error!("{err_msg}");
            (StatusCode::INTERNAL_SERVER_ERROR, err_msg).into_response()
        }
    }
}

pub async fn get_data(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, Json<Status>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_data()");

    // fresh snapshot from the control loop, the last published one if it is not answering
    let status = match state.submit(Command::Status).await {
        Ok(Reply::Status(status)) => status,
        Ok(other) => {
            warn!("Unexpected status reply: {other:?}");
            state.status.read().await.clone()
        }
        Err(e) => {
            warn!("Status request failed: {e:?}");
            state.status.read().await.clone()
        }
    };
    (StatusCode::OK, Json(status))
}

pub async fn toggle_demo(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, String) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} toggle_demo()");
    submit_command(&state, Command::ToggleDemo).await
}

pub async fn cancel_call(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, String) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} cancel_call()");
    submit_command(&state, Command::CancelCall).await
}

pub async fn reset_device(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, String) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} reset_device()");
    submit_command(&state, Command::Reset).await
}

async fn submit_command(state: &MyState, command: Command) -> (StatusCode, String) {
    match state.submit(command).await {
        Ok(reply) => (StatusCode::OK, reply.text()),
        Err(e) => {
            let msg = format!("{command:?} failed: {e:?}");
            error!("{msg}");
            (StatusCode::SERVICE_UNAVAILABLE, msg)
        }
    }
}

pub async fn get_uptime(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, Json<Uptime>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_uptime()");
    (StatusCode::OK, Json(Uptime::new(*state.uptime.read().await)))
}

pub async fn get_config(
    State(state): State<Arc<Pin<Box<MyState>>>>,
) -> (StatusCode, Json<MyConfig>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_conf()");
    (StatusCode::OK, Json(state.config.read().await.clone()))
}

pub async fn post_config(
    State(state): State<Arc<Pin<Box<MyState>>>>,
    Json(config): Json<MyConfig>,
) -> (StatusCode, String) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} set_conf()");

    if let Err(e) = config.validate() {
        let msg = format!("Config error: {e}");
        error!("{msg}");
        return (StatusCode::BAD_REQUEST, msg);
    }

    info!("Saving new config to nvs...");
    Box::pin(save_conf(state, config)).await
}

pub async fn reset_config(State(state): State<Arc<Pin<Box<MyState>>>>) -> (StatusCode, String) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} reset_conf()");

    info!("Saving default config to nvs...");
    Box::pin(save_conf(state, MyConfig::default())).await
}

async fn save_conf(state: Arc<Pin<Box<MyState>>>, config: MyConfig) -> (StatusCode, String) {
    let mut store = state.store.lock().await;
    match config.to_store(&mut **store) {
        Ok(_) => {
            info!("Config saved to nvs. Resetting soon...");
            *state.config.write().await = config;
            *state.reset.write().await = true;
            (StatusCode::OK, "OK".to_string())
        }
        Err(e) => {
            let msg = format!("Nvs write error: {e:?}");
            error!("{}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_page_shows_address_and_limit() {
        let page = IndexPage {
            myid: "esp32alarm-0A0B0C".into(),
            ip_addr: "192.168.71.1".into(),
            location: "Lab <2>".into(),
            limit: format!("{ALERT_LIMIT:.1}"),
            version: FW_VERSION,
        };
        let html = page.render().unwrap();
        assert!(html.contains("esp32alarm-0A0B0C at 192.168.71.1"));
        assert!(html.contains("limit 33.0"));
        assert!(html.contains("Lab &#60;2&#62;") || html.contains("Lab &lt;2&gt;"));
    }
}

// EOF
