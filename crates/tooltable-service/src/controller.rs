//! Machine controller seam
//!
//! The service reads the spindle tool and homing state from the
//! controller, and sends it two commands: reload the tool table, and the
//! MDI line that puts a remembered tool back in the spindle.

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use tooltable_core::{Error, Result};

/// State changes reported by the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineEvent {
    /// Tool in spindle changed
    ToolInSpindleChanged(i32),
    /// The controller reloaded its tool table
    ToolTableChanged,
    /// All axes homed state changed
    AllAxesHomed(bool),
    /// Machine enabled state changed
    EnabledChanged(bool),
}

impl std::fmt::Display for MachineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineEvent::ToolInSpindleChanged(n) => write!(f, "Tool in spindle: {}", n),
            MachineEvent::ToolTableChanged => write!(f, "Tool table changed"),
            MachineEvent::AllAxesHomed(homed) => write!(f, "All axes homed: {}", homed),
            MachineEvent::EnabledChanged(enabled) => write!(f, "Enabled: {}", enabled),
        }
    }
}

/// Machine controller interface used by the tool table service
#[async_trait]
pub trait MachineController: Send + Sync {
    /// Tool number currently in the spindle, `0` for none
    fn tool_in_spindle(&self) -> i32;

    /// Whether every axis is homed
    fn all_axes_homed(&self) -> bool;

    /// Whether the machine is enabled
    fn is_enabled(&self) -> bool;

    /// Make the controller re-read its tool table
    async fn load_tool_table(&self) -> Result<()>;

    /// Execute one MDI command
    async fn issue_mdi(&self, command: &str) -> Result<()>;

    /// Stream of controller state changes
    fn subscribe(&self) -> broadcast::Receiver<MachineEvent>;
}

#[derive(Debug, Default)]
struct SimulatedState {
    tool_in_spindle: i32,
    homed: bool,
    enabled: bool,
    offline: bool,
    mdi_history: Vec<String>,
    tool_table_loads: usize,
}

/// In-process controller for tests, previews and the CLI
#[derive(Debug)]
pub struct SimulatedController {
    state: RwLock<SimulatedState>,
    tx: broadcast::Sender<MachineEvent>,
}

impl SimulatedController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            state: RwLock::new(SimulatedState::default()),
            tx,
        }
    }

    fn emit(&self, event: MachineEvent) {
        tracing::trace!("Simulated controller: {}", event);
        let _ = self.tx.send(event);
    }

    /// Change the spindle tool and notify subscribers
    pub fn set_tool_in_spindle(&self, tool_number: i32) {
        self.state.write().tool_in_spindle = tool_number;
        self.emit(MachineEvent::ToolInSpindleChanged(tool_number));
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.write().enabled = enabled;
        self.emit(MachineEvent::EnabledChanged(enabled));
    }

    pub fn set_homed(&self, homed: bool) {
        self.state.write().homed = homed;
        self.emit(MachineEvent::AllAxesHomed(homed));
    }

    /// Report a tool table change made outside the service
    pub fn notify_tool_table_changed(&self) {
        self.emit(MachineEvent::ToolTableChanged);
    }

    /// Make every command fail, as if the controller were unreachable
    pub fn set_offline(&self, offline: bool) {
        self.state.write().offline = offline;
    }

    /// MDI commands issued so far
    pub fn mdi_history(&self) -> Vec<String> {
        self.state.read().mdi_history.clone()
    }

    /// Number of tool table reload commands received
    pub fn tool_table_loads(&self) -> usize {
        self.state.read().tool_table_loads
    }

    fn check_online(&self) -> Result<()> {
        if self.state.read().offline {
            Err(Error::Controller("controller is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Default for SimulatedController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MachineController for SimulatedController {
    fn tool_in_spindle(&self) -> i32 {
        self.state.read().tool_in_spindle
    }

    fn all_axes_homed(&self) -> bool {
        self.state.read().homed
    }

    fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    async fn load_tool_table(&self) -> Result<()> {
        self.check_online()?;
        self.state.write().tool_table_loads += 1;
        Ok(())
    }

    async fn issue_mdi(&self, command: &str) -> Result<()> {
        self.check_online()?;
        self.state.write().mdi_history.push(command.to_string());

        // M61 sets the spindle tool without a tool change
        if let Some(tool_number) = m61_tool_number(command) {
            self.set_tool_in_spindle(tool_number);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<MachineEvent> {
        self.tx.subscribe()
    }
}

fn m61_tool_number(command: &str) -> Option<i32> {
    let mut words = command.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("M61") {
        return None;
    }
    words
        .find_map(|w| w.strip_prefix('Q').or_else(|| w.strip_prefix('q')))
        .and_then(|n| n.parse().ok())
}
