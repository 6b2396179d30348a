//! View projector
//!
//! Pure derivation of what the dashboard shows from the retained events:
//! - `projector`: filtering, newest-first ordering and per-row summaries.
//! - `render`: HTML markup and the window title.
//! - `types`: rows, the protocol filter and the published `DashboardView`.

pub mod projector;
pub mod render;
pub mod types;

pub use projector::{project, render_row};
pub use render::{escape_html, render_rows_html, title_with_unread};
pub use types::{DashboardView, Detail, DetailBody, ProtocolFilter, Row, PLACEHOLDER};
