/*!
The in-process tracing runtime.

Every generated event source is backed by an [`EventSourceBase`]. The base owns the provider's
identity and event manifest, decides whether an event is enabled, and delivers written events to
attached [`Listener`]s. There's no transport here; a listener is the outside observer.

Providers are registered in a process-wide registry when their event source is created. A listener
can be attached to a provider by name with [`enable_provider`] before or after the provider
exists, like a trace session enabling a provider.
*/

use core::{
    fmt,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
};

use uuid::Uuid;

use crate::{
    keywords::{Keywords, Opcode},
    level::Level,
    value::Payload,
};

/**
The manifest entry for a single event.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetadata {
    pub id: u32,
    pub name: String,
    pub level: Level,
    pub keywords: Keywords,
    pub opcode: Opcode,
    pub task: u16,
    pub version: u8,
    pub message: Option<String>,
    pub payload_names: Vec<Arc<str>>,
}

/**
An event delivered to a listener.
*/
#[derive(Debug, Clone, Copy)]
pub struct EventWritten<'a> {
    provider: &'a str,
    guid: Uuid,
    event: &'a EventMetadata,
    payload: &'a [Payload],
}

impl<'a> EventWritten<'a> {
    pub fn provider(&self) -> &'a str {
        self.provider
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn event(&self) -> &'a EventMetadata {
        self.event
    }

    pub fn id(&self) -> u32 {
        self.event.id
    }

    pub fn name(&self) -> &'a str {
        &self.event.name
    }

    pub fn level(&self) -> Level {
        self.event.level
    }

    pub fn payload(&self) -> &'a [Payload] {
        self.payload
    }

    /**
    Iterate over the payload values with their names.
    */
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a Payload)> + 'a {
        self.event
            .payload_names
            .iter()
            .map(|name| &**name)
            .zip(self.payload.iter())
    }
}

/**
An observer of written events.
*/
pub trait Listener {
    fn on_event(&self, evt: &EventWritten);
}

impl<'a, T: Listener + ?Sized> Listener for &'a T {
    fn on_event(&self, evt: &EventWritten) {
        (**self).on_event(evt)
    }
}

impl<T: Listener + ?Sized> Listener for Box<T> {
    fn on_event(&self, evt: &EventWritten) {
        (**self).on_event(evt)
    }
}

impl<T: Listener + ?Sized> Listener for Arc<T> {
    fn on_event(&self, evt: &EventWritten) {
        (**self).on_event(evt)
    }
}

impl<T: Listener> Listener for Option<T> {
    fn on_event(&self, evt: &EventWritten) {
        if let Some(listener) = self {
            listener.on_event(evt)
        }
    }
}

pub struct FromFn<F>(F);

impl<F: Fn(&EventWritten)> Listener for FromFn<F> {
    fn on_event(&self, evt: &EventWritten) {
        (self.0)(evt)
    }
}

pub fn from_fn<F: Fn(&EventWritten)>(f: F) -> FromFn<F> {
    FromFn(f)
}

type SharedListener = Arc<dyn Listener + Send + Sync>;

struct Session {
    id: u64,
    listener: SharedListener,
    level: Level,
    keywords: Keywords,
}

impl Session {
    fn admits(&self, level: Level, keywords: Keywords) -> bool {
        self.level.admits(level) && (self.keywords.is_none() || self.keywords.intersects(keywords))
    }
}

/**
A listener attached to an [`EventSourceBase`].
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/**
The provider side of an event source.
*/
pub struct EventSourceBase {
    name: String,
    guid: Uuid,
    events: HashMap<u32, EventMetadata>,
    enabled: AtomicBool,
    disposed: AtomicBool,
    sessions: RwLock<Vec<Session>>,
}

impl EventSourceBase {
    pub fn new(
        name: impl Into<String>,
        guid: Uuid,
        manifest: impl IntoIterator<Item = EventMetadata>,
    ) -> Self {
        EventSourceBase {
            name: name.into(),
            guid,
            events: manifest.into_iter().map(|event| (event.id, event)).collect(),
            enabled: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            sessions: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn event(&self, id: u32) -> Option<&EventMetadata> {
        self.events.get(&id)
    }

    /**
    Whether any attached listener wants events at `level` with `keywords`.

    This check doesn't take any locks while no listener is attached.
    */
    pub fn is_enabled(&self, level: Level, keywords: Keywords) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }

        self.read()
            .iter()
            .any(|session| session.admits(level, keywords))
    }

    /**
    Attach a listener that receives events at `level` or below, matching `keywords`.

    A disposed provider never delivers events, so listeners attached to it are dropped.
    */
    pub fn enable(
        &self,
        listener: impl Listener + Send + Sync + 'static,
        level: Level,
        keywords: Keywords,
    ) -> Subscription {
        self.enable_shared(Arc::new(listener), level, keywords)
    }

    fn enable_shared(
        &self,
        listener: SharedListener,
        level: Level,
        keywords: Keywords,
    ) -> Subscription {
        let subscription = Subscription(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));

        let mut sessions = self.write();
        if self.disposed.load(Ordering::Acquire) {
            return subscription;
        }

        sessions.push(Session {
            id: subscription.0,
            listener,
            level,
            keywords,
        });
        self.enabled.store(true, Ordering::Release);

        subscription
    }

    pub fn disable(&self, subscription: Subscription) {
        let mut sessions = self.write();
        sessions.retain(|session| session.id != subscription.0);

        self.enabled.store(!sessions.is_empty(), Ordering::Release);
    }

    /**
    Detach every listener and stop accepting new ones.
    */
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);

        let mut sessions = self.write();
        sessions.clear();
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /**
    Deliver the event `id` with its payload to every listener that admits it.
    */
    pub fn write_event(&self, id: u32, payload: &[Payload]) {
        let Some(event) = self.events.get(&id) else {
            tracing::debug!(provider = %self.name, id, "ignoring event missing from the manifest");
            return;
        };

        let listeners = self
            .read()
            .iter()
            .filter(|session| session.admits(event.level, event.keywords.or_all()))
            .map(|session| session.listener.clone())
            .collect::<Vec<_>>();

        let evt = EventWritten {
            provider: &self.name,
            guid: self.guid,
            event,
            payload,
        };

        for listener in listeners {
            listener.on_event(&evt);
        }
    }

    /**
    Deliver the event `id` without any payload.
    */
    pub fn write_event_empty(&self, id: u32) {
        self.write_event(id, &[])
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Session>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Session>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for EventSourceBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSourceBase")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("enabled", &self.enabled.load(Ordering::Relaxed))
            .finish()
    }
}

struct ProviderSession {
    provider: String,
    listener: SharedListener,
    level: Level,
    keywords: Keywords,
}

#[derive(Default)]
struct Registry {
    sources: RwLock<Vec<Weak<EventSourceBase>>>,
    sessions: RwLock<Vec<ProviderSession>>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();

    REGISTRY.get_or_init(Registry::default)
}

/**
Register a provider so it can be found by name.

Provider sessions already enabled for its name are attached to it.
*/
pub fn register(source: &Arc<EventSourceBase>) {
    let registry = registry();

    // Sessions are locked before sources, in the same order as `enable_provider`
    let sessions = registry.sessions.read().unwrap_or_else(|e| e.into_inner());

    {
        let mut sources = registry.sources.write().unwrap_or_else(|e| e.into_inner());
        sources.retain(|live| live.strong_count() > 0);
        sources.push(Arc::downgrade(source));
    }

    for session in sessions.iter().filter(|session| session.provider == source.name()) {
        source.enable_shared(session.listener.clone(), session.level, session.keywords);
    }
}

/**
All live registered providers.
*/
pub fn sources() -> Vec<Arc<EventSourceBase>> {
    registry()
        .sources
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .filter_map(Weak::upgrade)
        .collect()
}

/**
Attach a listener to every current and future provider named `provider`.
*/
pub fn enable_provider(
    provider: impl Into<String>,
    listener: impl Listener + Send + Sync + 'static,
    level: Level,
    keywords: Keywords,
) {
    let provider = provider.into();
    let listener: SharedListener = Arc::new(listener);

    // Providers registered while this lock is held attach the session themselves
    let mut sessions = registry().sessions.write().unwrap_or_else(|e| e.into_inner());

    for source in sources().iter().filter(|source| source.name() == provider) {
        source.enable_shared(listener.clone(), level, keywords);
    }

    sessions.push(ProviderSession {
        provider,
        listener,
        level,
        keywords,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(u32, Vec<Payload>)>>);

    impl Listener for Recorder {
        fn on_event(&self, evt: &EventWritten) {
            self.0
                .lock()
                .unwrap()
                .push((evt.id(), evt.payload().to_vec()));
        }
    }

    fn metadata(id: u32, level: Level, keywords: Keywords) -> EventMetadata {
        EventMetadata {
            id,
            name: format!("event{}", id),
            level,
            keywords,
            opcode: Opcode::INFO,
            task: 0,
            version: 0,
            message: None,
            payload_names: vec!["value".into()],
        }
    }

    fn base(name: &str) -> EventSourceBase {
        EventSourceBase::new(
            name,
            Uuid::nil(),
            [
                metadata(1, Level::Informational, Keywords::NONE),
                metadata(2, Level::Verbose, Keywords::new(0x1)),
            ],
        )
    }

    #[test]
    fn disabled_without_listeners() {
        let base = base("disabled");

        assert!(!base.is_enabled(Level::LogAlways, Keywords::ALL));
    }

    #[test]
    fn level_and_keyword_rules() {
        let base = base("rules");
        let sub = base.enable(from_fn(|_| {}), Level::Informational, Keywords::new(0x2));

        assert!(base.is_enabled(Level::Error, Keywords::ALL));
        assert!(base.is_enabled(Level::LogAlways, Keywords::new(0x2)));
        assert!(!base.is_enabled(Level::Verbose, Keywords::ALL));
        assert!(!base.is_enabled(Level::Error, Keywords::new(0x1)));

        base.disable(sub);
        assert!(!base.is_enabled(Level::Error, Keywords::ALL));

        base.enable(from_fn(|_| {}), Level::LogAlways, Keywords::NONE);
        assert!(base.is_enabled(Level::Verbose, Keywords::new(0x8)));
    }

    #[test]
    fn write_delivers_to_admitting_listeners() {
        let base = base("write");

        let info = Arc::new(Recorder::default());
        let verbose = Arc::new(Recorder::default());

        base.enable(info.clone(), Level::Informational, Keywords::NONE);
        base.enable(verbose.clone(), Level::Verbose, Keywords::new(0x1));

        base.write_event(1, &[Payload::I32(1)]);
        base.write_event(2, &[Payload::I32(2)]);
        base.write_event_empty(2);
        base.write_event(99, &[]);

        assert_eq!(
            vec![(1, vec![Payload::I32(1)])],
            *info.0.lock().unwrap()
        );
        assert_eq!(
            vec![
                (1, vec![Payload::I32(1)]),
                (2, vec![Payload::I32(2)]),
                (2, vec![])
            ],
            *verbose.0.lock().unwrap()
        );
    }

    #[test]
    fn dispose_detaches_listeners() {
        let base = base("dispose");
        let recorder = Arc::new(Recorder::default());

        base.enable(recorder.clone(), Level::Verbose, Keywords::NONE);
        base.dispose();

        assert!(base.is_disposed());
        assert!(!base.is_enabled(Level::LogAlways, Keywords::ALL));

        base.enable(recorder.clone(), Level::Verbose, Keywords::NONE);
        base.write_event(1, &[Payload::I32(1)]);

        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn provider_sessions_attach_to_live_and_future_sources() {
        let live = Arc::new(base("runtime-tests-session"));
        register(&live);

        let recorder = Arc::new(Recorder::default());
        enable_provider(
            "runtime-tests-session",
            recorder.clone(),
            Level::Verbose,
            Keywords::NONE,
        );

        let future = Arc::new(base("runtime-tests-session"));
        register(&future);

        let other = Arc::new(base("runtime-tests-other"));
        register(&other);

        assert!(live.is_enabled(Level::Verbose, Keywords::ALL));
        assert!(future.is_enabled(Level::Verbose, Keywords::ALL));
        assert!(!other.is_enabled(Level::Verbose, Keywords::ALL));

        live.write_event(1, &[Payload::U8(1)]);
        future.write_event(1, &[Payload::U8(2)]);

        assert_eq!(2, recorder.0.lock().unwrap().len());
        assert!(sources().iter().any(|source| Arc::ptr_eq(source, &live)));
    }

    #[test]
    fn fields_pair_names_with_values() {
        let base = base("fields");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let captured = seen.clone();
        base.enable(
            from_fn(move |evt| {
                let mut seen = captured.lock().unwrap();
                for (name, value) in evt.fields() {
                    seen.push(format!("{}={}", name, value));
                }
            }),
            Level::Verbose,
            Keywords::NONE,
        );

        base.write_event(1, &[Payload::from("a")]);

        assert_eq!(vec!["value=a".to_owned()], *seen.lock().unwrap());
    }
}
