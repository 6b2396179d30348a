use rust_embed::RustEmbed;
use serde::Serialize;

use crate::backend::ControlAction;

/// Static files of the dashboard page.
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
pub struct Assets;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Answer of a successful action route.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub action: String,
    pub ok: bool,
}

impl ActionResponse {
    pub fn control(action: ControlAction) -> Self {
        Self {
            action: action.as_str().to_string(),
            ok: true,
        }
    }

    pub fn local(action: &str) -> Self {
        Self {
            action: action.to_string(),
            ok: true,
        }
    }
}
