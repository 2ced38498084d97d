//! Tool table events
//!
//! Provides:
//! - Event types published by the tool table service
//! - A per-service dispatcher with async receivers and synchronous handlers

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use tooltable_core::{ToolRecord, ToolTable};

/// Tool table event types
#[derive(Debug, Clone)]
pub enum ToolTableEvent {
    /// The table was (re)loaded
    TableChanged(Arc<ToolTable>),
    /// The tool in the spindle, or its record, changed
    CurrentToolChanged(ToolRecord),
    /// The remembered tool was reloaded after homing
    ToolReloadIssued {
        /// Tool number passed to `M61`
        tool_number: i32,
    },
}

impl ToolTableEvent {
    /// Category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            ToolTableEvent::TableChanged(_) => EventCategory::Table,
            ToolTableEvent::CurrentToolChanged(_) => EventCategory::CurrentTool,
            ToolTableEvent::ToolReloadIssued { .. } => EventCategory::ToolReload,
        }
    }
}

impl std::fmt::Display for ToolTableEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolTableEvent::TableChanged(table) => {
                write!(f, "Tool table changed ({} tools)", table.tools().count())
            }
            ToolTableEvent::CurrentToolChanged(tool) => {
                write!(f, "Current tool: T{} ({})", tool.tool_number, tool.remark)
            }
            ToolTableEvent::ToolReloadIssued { tool_number } => {
                write!(f, "Reloaded tool {} into the spindle", tool_number)
            }
        }
    }
}

/// Event categories for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Table,
    CurrentTool,
    ToolReload,
}

/// Filter to receive only specific event types
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Receive all events.
    #[default]
    All,
    /// Receive events matching any of these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    /// Check if an event matches this filter
    pub fn matches(&self, event: &ToolTableEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

/// Subscription handle for removing a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

type EventHandler = Arc<dyn Fn(ToolTableEvent) + Send + Sync>;

/// Event dispatcher owned by one service instance
#[derive(Clone)]
pub struct ToolTableEvents {
    tx: broadcast::Sender<ToolTableEvent>,
    handlers: Arc<RwLock<HashMap<SubscriptionId, (EventFilter, EventHandler)>>>,
}

impl ToolTableEvents {
    /// Create a dispatcher with the given broadcast buffer size
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self {
            tx,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Receiver for async consumers
    pub fn subscribe(&self) -> broadcast::Receiver<ToolTableEvent> {
        self.tx.subscribe()
    }

    /// Register a synchronous handler.
    ///
    /// Handlers run on the publishing task and must return quickly. They
    /// may register or remove handlers; changes apply from the next event.
    pub fn on<F>(&self, filter: EventFilter, handler: F) -> SubscriptionId
    where
        F: Fn(ToolTableEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.handlers.write().insert(id, (filter, Arc::new(handler)));
        tracing::debug!("Subscription {} added", id);
        id
    }

    /// Remove a handler. Returns true if it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.handlers.write().remove(&id).is_some();
        if removed {
            tracing::debug!("Subscription {} removed", id);
        }
        removed
    }

    /// Publish an event; returns the number of receivers and handlers reached
    pub fn publish(&self, event: ToolTableEvent) -> usize {
        tracing::trace!("Publishing: {}", event);
        let matching: Vec<EventHandler> = self
            .handlers
            .read()
            .values()
            .filter(|(filter, _)| filter.matches(&event))
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in &matching {
            handler(event.clone());
        }
        // no receivers is not an error
        matching.len() + self.tx.send(event).unwrap_or(0)
    }

    /// Number of async receivers plus handlers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count() + self.handlers.read().len()
    }
}

impl Default for ToolTableEvents {
    fn default() -> Self {
        Self::new(64)
    }
}

impl std::fmt::Debug for ToolTableEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolTableEvents")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_without_subscribers() {
        let events = ToolTableEvents::default();
        assert_eq!(
            events.publish(ToolTableEvent::ToolReloadIssued { tool_number: 1 }),
            0
        );
    }

    #[tokio::test]
    async fn test_receiver_gets_events() {
        let events = ToolTableEvents::new(8);
        let mut rx = events.subscribe();
        events.publish(ToolTableEvent::CurrentToolChanged(ToolRecord::no_tool()));

        match rx.recv().await.unwrap() {
            ToolTableEvent::CurrentToolChanged(tool) => assert!(tool.is_no_tool()),
            other => panic!("unexpected event {}", other),
        }
    }

    #[test]
    fn test_handler_filtering_and_unsubscribe() {
        let events = ToolTableEvents::default();
        let reloads = Arc::new(AtomicUsize::new(0));
        let counter = reloads.clone();

        let id = events.on(
            EventFilter::Categories(vec![EventCategory::ToolReload]),
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        events.publish(ToolTableEvent::TableChanged(Arc::new(ToolTable::with_sentinel())));
        events.publish(ToolTableEvent::ToolReloadIssued { tool_number: 3 });
        assert_eq!(reloads.load(Ordering::SeqCst), 1);

        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        events.publish(ToolTableEvent::ToolReloadIssued { tool_number: 3 });
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_unsubscribe_itself() {
        let events = ToolTableEvents::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let own_id = Arc::new(parking_lot::Mutex::new(None::<SubscriptionId>));

        let id = events.on(EventFilter::All, {
            let events = events.clone();
            let calls = calls.clone();
            let own_id = own_id.clone();
            move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = own_id.lock().take() {
                    events.unsubscribe(id);
                    events.on(EventFilter::All, |_| {});
                }
            }
        });
        *own_id.lock() = Some(id);

        assert_eq!(events.publish(ToolTableEvent::ToolReloadIssued { tool_number: 1 }), 1);
        assert_eq!(events.publish(ToolTableEvent::ToolReloadIssued { tool_number: 2 }), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(events.subscriber_count(), 1);
    }

    #[test]
    fn test_display() {
        let mut table = ToolTable::with_sentinel();
        table.insert(ToolRecord::new_tool(1));
        let event = ToolTableEvent::TableChanged(Arc::new(table));
        assert_eq!(event.to_string(), "Tool table changed (1 tools)");
    }
}
