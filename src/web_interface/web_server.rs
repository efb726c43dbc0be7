use log::{info, warn};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;

use warp::{Filter, Rejection, Reply};

use super::routes::{
    capture_route, captures_route, handle_rejection, liveness_route, CaptureEndpoint,
};
use crate::browser::driver::BrowserLauncher;
use crate::error_handling::types::WebError;

/// HTTP front of the capture service
pub struct WebServer<L: BrowserLauncher> {
    endpoint: Arc<CaptureEndpoint<L>>,
}

impl<L: BrowserLauncher> WebServer<L> {
    pub fn new(endpoint: CaptureEndpoint<L>) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
        }
    }

    /// All routes with CORS and body-error recovery applied.
    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let cors = warp::cors()
            .allow_any_origin()
            .allow_methods(vec!["GET", "POST"])
            .allow_headers(vec!["content-type"]);

        liveness_route()
            .or(capture_route(self.endpoint.clone()))
            .or(captures_route(self.endpoint.store()))
            .recover(handle_rejection)
            .with(cors)
    }

    /// Binds `bind_address:port` and serves until the process is stopped.
    pub async fn start(&self, bind_address: &str, port: u16) -> Result<(), WebError> {
        let ip: IpAddr = bind_address
            .parse()
            .map_err(|e| WebError::BindFailed(format!("{}: {}", bind_address, e)))?;
        let addr = SocketAddr::new(ip, port);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), WebError> {
        match listener.local_addr() {
            Ok(addr) => info!("Capture endpoint listening on http://{}/api/capture", addr),
            Err(e) => warn!("Listening on an unknown address: {}", e),
        }
        warp::serve(self.routes()).incoming(listener).run().await;

        Ok(())
    }
}
