pub mod backend;
pub use backend::{Backend, HttpBackend, LiveFeed};

pub mod configuration;

pub mod error_handling;

pub mod event_model;

pub mod event_store;

pub mod reconciler;
pub use reconciler::{ReconcilerHandle, StreamReconciler};

pub mod view;

pub mod web_interface;
