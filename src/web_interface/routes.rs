use std::convert::Infallible;

use log::{debug, warn};
use warp::{
    http::{header::CONTENT_TYPE, StatusCode},
    reply, Filter, Rejection, Reply,
};

use super::types::{ActionResponse, ApiError, Assets};
use crate::backend::ControlAction;
use crate::error_handling::types::ControlError;
use crate::reconciler::{ReconcilerHandle, StatusHandle};
use crate::view::{render_rows_html, ProtocolFilter};

const INDEX: &str = "index.html";

fn with_reconciler(
    handle: ReconcilerHandle,
) -> impl Filter<Extract = (ReconcilerHandle,), Error = Infallible> + Clone {
    warp::any().map(move || handle.clone())
}

fn with_status(
    handle: StatusHandle,
) -> impl Filter<Extract = (StatusHandle,), Error = Infallible> + Clone {
    warp::any().map(move || handle.clone())
}

fn asset_reply(name: &str) -> warp::reply::Response {
    match Assets::get(name) {
        Some(file) => {
            let mime = mime_guess::from_path(name).first_or_octet_stream();
            reply::with_header(file.data.into_owned(), CONTENT_TYPE, mime.as_ref()).into_response()
        }
        None => reply::with_status(
            reply::json(&ApiError::new(format!("No asset named {}", name))),
            StatusCode::NOT_FOUND,
        )
        .into_response(),
    }
}

fn unavailable() -> warp::reply::Response {
    reply::with_status(
        reply::json(&ApiError::new(ControlError::ReconcilerUnavailable.to_string())),
        StatusCode::SERVICE_UNAVAILABLE,
    )
    .into_response()
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .map(|| asset_reply(INDEX))
}

/// GET /assets/:file
pub fn assets_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("assets" / String)
        .and(warp::get())
        .map(|name: String| asset_reply(&name))
}

/// GET /api/view
pub fn view_route(
    reconciler: ReconcilerHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "view")
        .and(warp::get())
        .and(with_reconciler(reconciler))
        .map(|handle: ReconcilerHandle| reply::json(&handle.view()))
}

/// GET /api/rows
pub fn rows_route(
    reconciler: ReconcilerHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "rows")
        .and(warp::get())
        .and(with_reconciler(reconciler))
        .map(|handle: ReconcilerHandle| {
            let view = handle.view();
            let html = render_rows_html(&view.rows);
            reply::with_header(
                reply::with_header(reply::html(html), "X-Window-Title", view.title),
                "X-Unread-Http",
                view.unread_http.to_string(),
            )
        })
}

/// GET /api/status
pub fn status_route(
    reconciler: ReconcilerHandle,
    status: StatusHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "status")
        .and(warp::get())
        .and(with_reconciler(reconciler))
        .and(with_status(status))
        .map(|reconciler: ReconcilerHandle, status: StatusHandle| {
            let hint = reconciler.view().payload_hint;
            reply::json(&status.current().with_payload_hint(hint))
        })
}

/// POST /api/actions/:action
pub fn action_route(
    reconciler: ReconcilerHandle,
    status: StatusHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "actions" / String)
        .and(warp::post())
        .and(with_reconciler(reconciler))
        .and(with_status(status))
        .and_then(
            |name: String, reconciler: ReconcilerHandle, status: StatusHandle| async move {
                if name.eq_ignore_ascii_case("clear") {
                    let res = match reconciler.clear().await {
                        Ok(()) => reply::json(&ActionResponse::local("clear")).into_response(),
                        Err(_) => unavailable(),
                    };
                    return Ok::<_, Rejection>(res);
                }

                let action = match ControlAction::parse(&name) {
                    Some(action) => action,
                    None => {
                        let res = reply::with_status(
                            reply::json(&ApiError::new(format!("Unknown action {}", name))),
                            StatusCode::NOT_FOUND,
                        )
                        .into_response();
                        return Ok::<_, Rejection>(res);
                    }
                };

                let res = match reconciler.control(action).await {
                    Ok(()) => {
                        status.refresh_now();
                        reply::json(&ActionResponse::control(action)).into_response()
                    }
                    Err(ControlError::ReconcilerUnavailable) => unavailable(),
                    Err(e) => {
                        warn!("{} failed: {}", action, e);
                        status.refresh_now();
                        reply::with_status(
                            reply::json(&ApiError::new(e.to_string())),
                            StatusCode::BAD_GATEWAY,
                        )
                        .into_response()
                    }
                };
                Ok::<_, Rejection>(res)
            },
        )
}

/// POST /api/filter/:name
pub fn filter_route(
    reconciler: ReconcilerHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "filter" / String)
        .and(warp::post())
        .and(with_reconciler(reconciler))
        .and_then(|name: String, reconciler: ReconcilerHandle| async move {
            let filter = ProtocolFilter::parse(&name);
            debug!("Filter requested: {}", filter);
            let res = match reconciler.set_filter(filter).await {
                Ok(()) => reply::json(&reconciler.view()).into_response(),
                Err(_) => unavailable(),
            };
            Ok::<_, Rejection>(res)
        })
}

/// POST /api/visibility/:state
pub fn visibility_route(
    reconciler: ReconcilerHandle,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "visibility" / String)
        .and(warp::post())
        .and(with_reconciler(reconciler))
        .and_then(|state: String, reconciler: ReconcilerHandle| async move {
            let visible = match state.to_ascii_lowercase().as_str() {
                "visible" => true,
                "hidden" => false,
                _ => {
                    let res = reply::with_status(
                        reply::json(&ApiError::new(format!("Unknown visibility {}", state))),
                        StatusCode::BAD_REQUEST,
                    )
                    .into_response();
                    return Ok::<_, Rejection>(res);
                }
            };
            let res = match reconciler.set_visibility(visible).await {
                Ok(()) => reply::json(&ActionResponse::local(&state)).into_response(),
                Err(_) => unavailable(),
            };
            Ok::<_, Rejection>(res)
        })
}
