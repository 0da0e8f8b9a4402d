use chrono::{DateTime, Utc};
use entigraph_core::{DBEvent, Object};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

type Handler = Arc<dyn Fn(DBEvent) -> BoxFuture<'static, ()> + Send + Sync>;

struct Subscriber {
    id: u64,
    pattern: String,
    handler: Handler,
}

/// Pattern-subscribed event bus with an append-only history.
///
/// Handlers for one emitted event run in subscription order, each awaited to
/// completion before the next; `emit` resolves once every matching handler
/// for that single event has run.
#[derive(Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    history: RwLock<Vec<DBEvent>>,
    next_id: AtomicU64,
}

/// Narrowing filter for `list` and `replay`.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub pattern: Option<String>,
    pub actor: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl EventFilter {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    fn matches(&self, event: &DBEvent) -> bool {
        if let Some(pattern) = &self.pattern {
            if !event_matches(pattern, &event.event) {
                return false;
            }
        }
        if let Some(actor) = &self.actor {
            if event.actor.as_deref() != Some(actor.as_str()) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// Removes its subscription when told to; dropping it without calling
/// [`unsubscribe`](SubscriptionHandle::unsubscribe) leaves the handler live.
pub struct SubscriptionHandle {
    id: u64,
    subscribers: Weak<RwLock<Vec<Subscriber>>>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.write().retain(|s| s.id != self.id);
        }
    }
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribes a handler to an event pattern: exact name, `Type.*`,
    /// `*.action`, or `*`.
    pub fn on<F, Fut>(&self, pattern: &str, handler: F) -> SubscriptionHandle
    where
        F: Fn(DBEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: Handler = Arc::new(move |event| Box::pin(handler(event)));
        self.subscribers.write().push(Subscriber {
            id,
            pattern: pattern.to_string(),
            handler,
        });
        SubscriptionHandle {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub async fn emit(&self, event: DBEvent) {
        trace!(event = %event.event, "emit");
        self.history.write().push(event.clone());

        // Snapshot matching handlers so emission never holds the lock across
        // an await point.
        let handlers: Vec<Handler> = {
            let subscribers = self.subscribers.read();
            subscribers
                .iter()
                .filter(|s| event_matches(&s.pattern, &event.event))
                .map(|s| s.handler.clone())
                .collect()
        };

        for handler in handlers {
            handler(event.clone()).await;
        }
    }

    /// Legacy two-argument form, normalized into the structured event.
    pub async fn emit_named(&self, event: &str, payload: Object) {
        self.emit(DBEvent::named(event, payload)).await;
    }

    pub fn list(&self, filter: &EventFilter) -> Vec<DBEvent> {
        self.history
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Reprocesses a bounded, time-ordered window of historical events,
    /// awaiting the handler once per event.
    pub async fn replay<F, Fut>(&self, filter: &EventFilter, handler: F)
    where
        F: Fn(DBEvent) -> Fut,
        Fut: Future<Output = ()>,
    {
        for event in self.list(filter) {
            handler(event).await;
        }
    }
}

/// Matches an event name against a subscription pattern. The scope separator
/// may be `.` (`Type.action`) or `:` (`kind:action`); `*` wildcards either
/// segment or the whole name.
pub fn event_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match (split_name(pattern), split_name(name)) {
        (Some((p_scope, p_action)), Some((scope, action))) => {
            (p_scope == "*" || p_scope == scope) && (p_action == "*" || p_action == action)
        }
        _ => pattern == name,
    }
}

fn split_name(name: &str) -> Option<(&str, &str)> {
    name.split_once(['.', ':'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn pattern_matching() {
        assert!(event_matches("*", "Startup.created"));
        assert!(event_matches("Startup.*", "Startup.created"));
        assert!(event_matches("*.created", "Startup.created"));
        assert!(event_matches("Startup.created", "Startup.created"));
        assert!(event_matches("cascade:*", "cascade:progress"));
        assert!(event_matches("*.progress", "cascade:progress"));

        assert!(!event_matches("Startup.*", "Idea.created"));
        assert!(!event_matches("*.created", "Startup.updated"));
        assert!(!event_matches("Startup.created", "Startup.deleted"));
    }

    #[tokio::test]
    async fn handlers_fire_in_subscription_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            bus.on("Post.*", move |_event| {
                let seen = seen.clone();
                async move {
                    seen.lock().push(tag);
                }
            });
        }

        bus.emit(DBEvent::new("Post.created")).await;
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let handle = {
            let count = count.clone();
            bus.on("*", move |_event| {
                let count = count.clone();
                async move {
                    *count.lock() += 1;
                }
            })
        };

        bus.emit(DBEvent::new("Post.created")).await;
        handle.unsubscribe();
        bus.emit(DBEvent::new("Post.created")).await;

        assert_eq!(*count.lock(), 1);
    }

    #[tokio::test]
    async fn legacy_emit_is_normalized() {
        let bus = EventBus::new();
        let mut payload = Object::new();
        payload.insert("title".to_string(), json!("hello"));
        bus.emit_named("Post.created", payload).await;

        let events = bus.list(&EventFilter::pattern("Post.created"));
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].object_data.as_ref().unwrap()["title"],
            json!("hello")
        );
    }

    #[tokio::test]
    async fn list_and_replay_respect_filters() {
        let bus = EventBus::new();
        bus.emit(DBEvent::new("Post.created")).await;
        bus.emit(DBEvent::new("Post.updated")).await;
        bus.emit(DBEvent::new("Idea.created")).await;

        assert_eq!(bus.list(&EventFilter::pattern("*.created")).len(), 2);
        assert_eq!(bus.list(&EventFilter::pattern("Post.*")).len(), 2);
        assert_eq!(bus.list(&EventFilter::default()).len(), 3);

        let replayed = Arc::new(Mutex::new(Vec::new()));
        {
            let replayed = replayed.clone();
            bus.replay(&EventFilter::pattern("Post.*"), move |event| {
                let replayed = replayed.clone();
                async move {
                    replayed.lock().push(event.event);
                }
            })
            .await;
        }
        assert_eq!(*replayed.lock(), vec!["Post.created", "Post.updated"]);
    }
}
