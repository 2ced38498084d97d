//! # Tool Table Service
//!
//! Keeps the in-memory tool table in step with its backend (the
//! `tool.tbl` file or a relational store), the file on disk and the
//! machine controller, and publishes change events to subscribers.

pub mod backend;
pub mod controller;
pub mod events;
pub mod scheduler;
pub mod service;
pub mod watcher;

pub use backend::{backend_from_config, DatabaseBackend, FileBackend, TableBackend};
pub use controller::{MachineController, MachineEvent, SimulatedController};
pub use events::{EventCategory, EventFilter, SubscriptionId, ToolTableEvent, ToolTableEvents};
pub use scheduler::{Debounce, DeferredTask, Scheduler};
pub use service::{ServiceOptions, ServiceState, ToolTableService};
pub use watcher::FileWatcher;
