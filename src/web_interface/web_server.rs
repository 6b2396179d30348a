use std::net::{IpAddr, SocketAddr};

use log::info;
use warp::{Filter, Rejection, Reply};

use super::routes::*;
use crate::error_handling::types::WebError;
use crate::reconciler::{ReconcilerHandle, StatusHandle};

/// Web server for the dashboard page and its JSON/HTML API
pub struct WebServer {
    reconciler: ReconcilerHandle,
    status: StatusHandle,
}

impl WebServer {
    pub fn new(reconciler: ReconcilerHandle, status: StatusHandle) -> Self {
        Self { reconciler, status }
    }

    /// Every route, composed.
    pub fn routes(&self) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        dashboard_route()
            .or(assets_route())
            .or(view_route(self.reconciler.clone()))
            .or(rows_route(self.reconciler.clone()))
            .or(status_route(self.reconciler.clone(), self.status.clone()))
            .or(action_route(self.reconciler.clone(), self.status.clone()))
            .or(filter_route(self.reconciler.clone()))
            .or(visibility_route(self.reconciler.clone()))
    }

    /// Serves until the process ends.
    pub async fn start(&self, bind_address: &str, port: u16) -> Result<(), WebError> {
        let addr = socket_address(bind_address, port)?;
        info!("Dashboard listening on http://{}", addr);
        warp::serve(self.routes()).run(addr).await;
        Ok(())
    }
}

pub fn socket_address(bind_address: &str, port: u16) -> Result<SocketAddr, WebError> {
    let ip: IpAddr = bind_address
        .parse()
        .map_err(|_| WebError::BadAddress(bind_address.to_string()))?;
    Ok(SocketAddr::new(ip, port))
}
