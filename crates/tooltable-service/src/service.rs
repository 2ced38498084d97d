//! Tool table service
//!
//! Owns the in-memory tool table and keeps it in step with its backend,
//! the file on disk and the machine controller. Readers take cheap
//! snapshots; every reload builds a new table and swaps it in whole.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tooltable_core::{
    Column, ColumnSet, Error, Result, ToolRecord, ToolTable, ToolValue, NO_TOOL_NUMBER,
};
use tooltable_settings::{PersistentData, ToolTableConfig};

use crate::backend::{backend_from_config, TableBackend};
use crate::controller::{MachineController, MachineEvent};
use crate::events::{ToolTableEvent, ToolTableEvents};
use crate::scheduler::{Debounce, DeferredTask, Scheduler};
use crate::watcher::FileWatcher;

/// Lifecycle state of the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Created, `initialise` not yet called
    Uninitialized,
    /// Running, but the source has never loaded
    Empty,
    /// Running with a loaded table
    Loaded,
    /// Shut down
    Terminated,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Empty => write!(f, "empty"),
            Self::Loaded => write!(f, "loaded"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Service behaviour settings
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Columns written on save when the caller gives none
    pub columns: ColumnSet,
    /// Put the remembered tool back in the spindle after homing
    pub remember_tool_in_spindle: bool,
    /// Quiet period before reloading a changed file
    pub file_change_debounce: Duration,
    /// Delay between homing and the tool reload command
    pub tool_reload_delay: Duration,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            columns: ColumnSet::all(),
            remember_tool_in_spindle: true,
            file_change_debounce: Duration::from_millis(50),
            tool_reload_delay: Duration::from_millis(200),
            event_capacity: 64,
        }
    }
}

impl ServiceOptions {
    pub fn from_config(config: &ToolTableConfig) -> Self {
        Self {
            columns: config.column_set(),
            remember_tool_in_spindle: config.remember_tool_in_spindle,
            file_change_debounce: config.file_change_debounce(),
            tool_reload_delay: config.tool_reload_delay(),
            event_capacity: config.event_capacity,
        }
    }
}

struct Inner {
    backend: Arc<dyn TableBackend>,
    controller: Arc<dyn MachineController>,
    persistent: Arc<PersistentData>,
    options: ServiceOptions,
    table: RwLock<Arc<ToolTable>>,
    // held across load and swap so overlapping reloads finish in order
    reload_guard: tokio::sync::Mutex<()>,
    current_tool: AtomicI32,
    state: RwLock<ServiceState>,
    events: ToolTableEvents,
    scheduler: Scheduler,
    watcher: Mutex<Option<FileWatcher>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

/// The tool table service
///
/// Cloning yields another handle to the same service.
#[derive(Clone)]
pub struct ToolTableService {
    inner: Arc<Inner>,
}

impl ToolTableService {
    /// Create a service. Nothing is loaded until [`ToolTableService::initialise`].
    pub fn new(
        backend: Arc<dyn TableBackend>,
        controller: Arc<dyn MachineController>,
        persistent: Arc<PersistentData>,
        options: ServiceOptions,
    ) -> Self {
        let events = ToolTableEvents::new(options.event_capacity);
        Self {
            inner: Arc::new(Inner {
                backend,
                controller,
                persistent,
                options,
                table: RwLock::new(Arc::new(ToolTable::with_sentinel())),
                reload_guard: tokio::sync::Mutex::new(()),
                current_tool: AtomicI32::new(NO_TOOL_NUMBER),
                state: RwLock::new(ServiceState::Uninitialized),
                events,
                scheduler: Scheduler::new(),
                watcher: Mutex::new(None),
                event_loop: Mutex::new(None),
            }),
        }
    }

    /// Build the backend and persistent data described by `config`
    pub async fn from_config(
        config: &ToolTableConfig,
        controller: Arc<dyn MachineController>,
    ) -> Result<Self> {
        let backend = backend_from_config(config).await?;
        let persistent = Arc::new(PersistentData::open(&config.persistent_data_file));
        Ok(Self::new(
            backend,
            controller,
            persistent,
            ServiceOptions::from_config(config),
        ))
    }

    /// Load the table, start watching for changes and listening to the
    /// controller.
    ///
    /// Never fails: a missing source is logged and leaves the service
    /// [`ServiceState::Empty`] until a later reload finds it.
    pub async fn initialise(&self) {
        let inner = &self.inner;
        let state = inner.state();
        if state != ServiceState::Uninitialized {
            tracing::warn!("Tool table service already initialised ({})", state);
            return;
        }

        let machine_rx = inner.controller.subscribe();
        inner
            .current_tool
            .store(inner.controller.tool_in_spindle(), Ordering::SeqCst);

        // failures are logged inside reload
        let _ = inner.reload().await;

        let file_rx = inner.start_watcher();
        let handle = tokio::spawn(run_event_loop(
            Arc::downgrade(inner),
            inner.scheduler.token().clone(),
            file_rx,
            Some(machine_rx),
            inner.options.file_change_debounce,
        ));
        *inner.event_loop.lock() = Some(handle);

        tracing::info!(
            "Tool table service started on {} ({})",
            inner.backend.describe(),
            inner.state()
        );
    }

    /// Reload the table from the backend
    pub async fn reload(&self) -> Result<()> {
        self.inner.reload().await
    }

    /// Persist `table`, have the controller reload it, then reload.
    ///
    /// `columns` defaults to the configured set. On failure nothing is
    /// sent to the controller.
    pub async fn save(&self, table: &ToolTable, columns: Option<&ColumnSet>) -> Result<()> {
        let inner = &self.inner;
        inner.ensure_running()?;

        let columns = columns.unwrap_or(&inner.options.columns);
        inner.backend.save(table, columns).await?;
        inner.controller.load_tool_table().await?;
        inner.reload().await
    }

    /// Current table
    pub fn snapshot(&self) -> Arc<ToolTable> {
        self.inner.table.read().clone()
    }

    /// Tool number in the spindle
    pub fn current_tool_number(&self) -> i32 {
        self.inner.current_tool.load(Ordering::SeqCst)
    }

    /// Record of the tool in the spindle
    pub fn current_tool(&self) -> Result<ToolRecord> {
        self.snapshot().tool(self.current_tool_number()).cloned()
    }

    /// One field of the tool in the spindle; `None` for an unknown key
    pub fn current_tool_item(&self, key: &str) -> Result<Option<ToolValue>> {
        let Some(column) = Column::from_key(key) else {
            return Ok(None);
        };
        Ok(Some(self.current_tool()?.get(column)))
    }

    /// Default record for a new tool, numbered `tool_number` or the next
    /// free number
    pub fn new_tool(&self, tool_number: Option<i32>) -> ToolRecord {
        let number = tool_number.unwrap_or_else(|| self.snapshot().next_tool_number());
        ToolRecord::new_tool(number)
    }

    /// Receiver for service events
    pub fn subscribe(&self) -> broadcast::Receiver<ToolTableEvent> {
        self.inner.events.subscribe()
    }

    /// Event dispatcher, for registering synchronous handlers
    pub fn events(&self) -> &ToolTableEvents {
        &self.inner.events
    }

    pub fn state(&self) -> ServiceState {
        self.inner.state()
    }

    /// Columns written when `save` is given none
    pub fn columns(&self) -> &ColumnSet {
        &self.inner.options.columns
    }

    /// Whether the file watch is active
    pub fn is_watching(&self) -> bool {
        self.inner
            .watcher
            .lock()
            .as_ref()
            .is_some_and(FileWatcher::is_armed)
    }

    /// Remember the spindle tool, cancel deferred actions, stop the event
    /// loop and release the watcher.
    ///
    /// Returns the error from writing the persistent data, if any; the
    /// service is shut down either way.
    pub async fn terminate(&self) -> Result<()> {
        let inner = &self.inner;
        {
            let mut state = inner.state.write();
            if *state == ServiceState::Terminated {
                return Ok(());
            }
            *state = ServiceState::Terminated;
        }

        let tool_number = inner.controller.tool_in_spindle();
        let persisted = inner
            .persistent
            .set_tool_in_spindle(tool_number)
            .and_then(|()| inner.persistent.save());
        if let Err(e) = &persisted {
            tracing::error!("Failed to remember tool in spindle: {}", e);
        }

        inner.scheduler.cancel_all();
        let handle = inner.event_loop.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("Tool table event loop ended abnormally: {}", e);
            }
        }
        inner.watcher.lock().take();

        tracing::info!("Tool table service terminated (tool {} in spindle)", tool_number);
        persisted.map_err(Error::from)
    }
}

impl std::fmt::Debug for ToolTableService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolTableService")
            .field("backend", &self.inner.backend.describe())
            .field("state", &self.inner.state())
            .field("current_tool", &self.current_tool_number())
            .finish()
    }
}

impl Inner {
    fn state(&self) -> ServiceState {
        *self.state.read()
    }

    fn set_state(&self, state: ServiceState) {
        let mut current = self.state.write();
        if *current != ServiceState::Terminated {
            *current = state;
        }
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state() == ServiceState::Terminated {
            Err(Error::other("Tool table service has been terminated"))
        } else {
            Ok(())
        }
    }

    fn start_watcher(&self) -> Option<mpsc::UnboundedReceiver<()>> {
        let path = self.backend.watch_path()?;
        match FileWatcher::new(path) {
            Ok((watcher, rx)) => {
                *self.watcher.lock() = Some(watcher);
                Some(rx)
            }
            Err(e) => {
                tracing::warn!("Tool table changes will not be picked up: {}", e);
                None
            }
        }
    }

    fn rearm_watcher(&self) {
        if let Some(watcher) = self.watcher.lock().as_ref() {
            watcher.ensure_armed();
        }
    }

    async fn reload(&self) -> Result<()> {
        self.ensure_running()?;
        let _guard = self.reload_guard.lock().await;
        self.rearm_watcher();

        match self.backend.load().await {
            Ok(mut table) => {
                table.ensure_sentinel();
                let table = Arc::new(table);
                *self.table.write() = table.clone();
                self.set_state(ServiceState::Loaded);

                tracing::info!(
                    "Loaded {} tools from {}",
                    table.tools().count(),
                    self.backend.describe()
                );
                self.events.publish(ToolTableEvent::TableChanged(table));
                self.publish_current_tool();
                Ok(())
            }
            Err(e) => {
                if e.is_source_unavailable() {
                    tracing::error!(severity = "critical", "Tool table not loaded: {}", e);
                } else {
                    tracing::error!(
                        "Failed to load tool table from {}: {}",
                        self.backend.describe(),
                        e
                    );
                }
                if self.state() == ServiceState::Uninitialized {
                    self.set_state(ServiceState::Empty);
                }
                Err(e)
            }
        }
    }

    fn publish_current_tool(&self) {
        let tool_number = self.current_tool.load(Ordering::SeqCst);
        let tool = self.table.read().get(tool_number).cloned();
        match tool {
            Some(tool) => {
                self.events.publish(ToolTableEvent::CurrentToolChanged(tool));
            }
            None => {
                tracing::warn!("Tool {} in spindle is not in the tool table", tool_number);
            }
        }
    }

    fn set_current_tool(&self, tool_number: i32) {
        let previous = self.current_tool.swap(tool_number, Ordering::SeqCst);
        if previous != tool_number {
            tracing::debug!("Tool in spindle changed: {} -> {}", previous, tool_number);
            self.publish_current_tool();
        }
    }

    async fn handle_machine_event(&self, event: MachineEvent) {
        tracing::debug!("Machine event: {}", event);
        match event {
            MachineEvent::ToolInSpindleChanged(tool_number) => self.set_current_tool(tool_number),
            MachineEvent::ToolTableChanged => {
                // failures are logged inside reload
                let _ = self.reload().await;
            }
            MachineEvent::AllAxesHomed(true) => {
                self.recover_tool_after_homing();
            }
            MachineEvent::AllAxesHomed(false) | MachineEvent::EnabledChanged(_) => {}
        }
    }

    /// Schedule `M61 Q<n> G43` for the remembered tool when the machine
    /// came up homed with an empty spindle
    fn recover_tool_after_homing(&self) -> Option<DeferredTask> {
        if !self.options.remember_tool_in_spindle {
            return None;
        }
        if !(self.controller.all_axes_homed() && self.controller.is_enabled()) {
            tracing::debug!("Skipping tool recovery: machine not homed and enabled");
            return None;
        }

        let remembered = self.persistent.tool_in_spindle();
        if self.controller.tool_in_spindle() != NO_TOOL_NUMBER || remembered == NO_TOOL_NUMBER {
            return None;
        }

        tracing::info!("Reloading tool {} into the spindle after homing", remembered);
        let controller = self.controller.clone();
        let events = self.events.clone();
        Some(
            self.scheduler
                .schedule(self.options.tool_reload_delay, async move {
                    let command = format!("M61 Q{} G43", remembered);
                    match controller.issue_mdi(&command).await {
                        Ok(()) => {
                            events.publish(ToolTableEvent::ToolReloadIssued {
                                tool_number: remembered,
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to reload tool {}: {}", remembered, e)
                        }
                    }
                }),
        )
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
    }
}

async fn recv_file(rx: &mut Option<mpsc::UnboundedReceiver<()>>) -> Option<()> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_machine(
    rx: &mut Option<broadcast::Receiver<MachineEvent>>,
) -> std::result::Result<MachineEvent, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn run_event_loop(
    inner: Weak<Inner>,
    token: CancellationToken,
    mut file_rx: Option<mpsc::UnboundedReceiver<()>>,
    mut machine_rx: Option<broadcast::Receiver<MachineEvent>>,
    debounce_delay: Duration,
) {
    let mut debounce = Debounce::new(debounce_delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,

            change = recv_file(&mut file_rx) => match change {
                Some(()) => {
                    tracing::debug!("Tool table file changed");
                    debounce.trigger();
                }
                None => {
                    tracing::warn!("Tool table file watcher stopped");
                    file_rx = None;
                }
            },

            _ = debounce.elapsed() => {
                let Some(inner) = inner.upgrade() else { break };
                // failures are logged inside reload
                let _ = inner.reload().await;
            }

            event = recv_machine(&mut machine_rx) => match event {
                Ok(event) => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.handle_machine_event(event).await;
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} machine events", missed);
                }
                Err(RecvError::Closed) => {
                    tracing::warn!("Machine controller event stream closed");
                    machine_rx = None;
                }
            },
        }
    }

    tracing::debug!("Tool table event loop stopped");
}
