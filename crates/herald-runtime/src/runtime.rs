//! Process wiring around the dispatcher.
//!
//! A platform adapter pushes [`InboundEvent`]s into an mpsc channel; the
//! runtime spawns one task per event so slow handlers never hold up routing,
//! runs continuous events in the background, and on shutdown cancels them and
//! waits for every in-flight task.
//!
//! ```rust,ignore
//! use herald_runtime::{HeraldRuntime, InboundEvent};
//!
//! let runtime = HeraldRuntime::builder()
//!     .config_file("herald.toml")
//!     .registry(registry)
//!     .build()
//!     .await?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! tokio::spawn(adapter.forward_into(tx));
//! runtime.run(rx).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, trace, warn};

use herald_core::{BoxedStore, EventHandler, Guild, MemoryStore, Message, PermissionSource};
use herald_framework::{
    DispatchError, DispatchResult, Dispatcher, DispatcherHandle, EventRegistry, InstanceSlot,
};

use crate::config::{ConfigLoader, HeraldConfig, StoreBackend, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

// =============================================================================
// InboundEvent
// =============================================================================

/// A platform event handed to the runtime by an adapter.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A message. `guild` is `None` for private messages, which are ignored.
    Message {
        message: Message,
        guild: Option<Guild>,
    },
    /// A message that mentions the bot.
    Mention(Message),
    /// The bot joined a guild.
    GuildJoin(Guild),
    /// The bot left a guild.
    GuildLeave(Guild),
}

impl InboundEvent {
    /// A message posted in the guild it names.
    pub fn guild_message(message: Message) -> Self {
        let guild = Some(Guild::new(message.guild_id));
        Self::Message { message, guild }
    }

    /// A direct message outside any guild.
    pub fn private_message(message: Message) -> Self {
        Self::Message {
            message,
            guild: None,
        }
    }
}

// =============================================================================
// HeraldRuntime
// =============================================================================

/// Owns the dispatcher and drives it from an inbound event stream.
pub struct HeraldRuntime {
    config: HeraldConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    running: AtomicBool,
}

impl HeraldRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// The loaded configuration.
    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// The dispatcher, for handlers that need to call back into it.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Token cancelled when the runtime shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Whether [`run`](Self::run) or [`run_until`](Self::run_until) is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns a task that routes one event.
    ///
    /// Failures are logged; they never stop the runtime.
    pub fn dispatch(&self, event: InboundEvent) {
        let dispatcher = Arc::clone(&self.dispatcher);
        self.tasks.spawn(async move {
            if let Err(e) = route(&dispatcher, event).await {
                report(&dispatcher, e);
            }
        });
    }

    /// Runs until Ctrl+C, SIGTERM, or the inbound channel closes.
    pub async fn run(&self, inbound: mpsc::Receiver<InboundEvent>) -> RuntimeResult<()> {
        info!("Herald runtime is now running. Press Ctrl+C to stop.");
        self.run_until(inbound, wait_for_shutdown()).await
    }

    /// Runs until `shutdown` resolves or the inbound channel closes.
    pub async fn run_until<F>(
        &self,
        mut inbound: mpsc::Receiver<InboundEvent>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Runtime is already running");
            return Ok(());
        }

        self.start_continuous();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                next = inbound.recv() => match next {
                    Some(event) => self.dispatch(event),
                    None => {
                        info!("Inbound channel closed");
                        break;
                    }
                },
            }
        }

        self.stop().await;
        Ok(())
    }

    fn start_continuous(&self) {
        for event in self.dispatcher.continuous_events() {
            let EventHandler::Continuous(task) = event.handler() else {
                continue;
            };
            event.record_use();
            let work = task(self.shutdown.child_token());
            let name = event.name().to_string();
            debug!(event = %name, "Starting continuous event");
            self.tasks.spawn(async move {
                match work.await {
                    Ok(()) => debug!(event = %name, "Continuous event finished"),
                    Err(e) => error!(event = %name, error = %e, "Continuous event failed"),
                }
            });
        }
    }

    async fn stop(&self) {
        info!(in_flight = self.tasks.len(), "Stopping Herald runtime");
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.running.store(false, Ordering::SeqCst);
        info!("Runtime stopped");
    }
}

async fn route(dispatcher: &Dispatcher, event: InboundEvent) -> DispatchResult<()> {
    match event {
        InboundEvent::Message {
            message,
            guild: Some(guild),
        } => {
            dispatcher.on_message(Arc::new(message), guild).await?;
        }
        InboundEvent::Message { guild: None, .. } => {
            trace!("Private message ignored");
        }
        InboundEvent::Mention(message) => {
            dispatcher.on_mention(Arc::new(message)).await?;
        }
        InboundEvent::GuildJoin(guild) => {
            dispatcher.on_guild_join(guild).await?;
        }
        InboundEvent::GuildLeave(guild) => {
            dispatcher.on_guild_leave(guild).await?;
        }
    }
    Ok(())
}

fn report(dispatcher: &Dispatcher, err: DispatchError) {
    match &err {
        DispatchError::Handler { event, source } => {
            let reply = dispatcher
                .get_event(event)
                .map(|e| e.error_message().to_string())
                .unwrap_or_default();
            error!(event = %event, reply = %reply, error = %source, "Handler failed");
        }
        _ => error!(error = %err, "Dispatch failed"),
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl+C only"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Cannot listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`HeraldRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<HeraldConfig>,
    registry: EventRegistry,
    store: Option<BoxedStore>,
    permissions: Option<Arc<dyn PermissionSource>>,
    handles: Vec<DispatcherHandle>,
    slot: &'static InstanceSlot,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Creates a builder that loads configuration from the default locations.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            registry: EventRegistry::new(),
            store: None,
            permissions: None,
            handles: Vec::new(),
            slot: InstanceSlot::process(),
            init_logging: true,
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a directory to search for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Ignores `HERALD_*` environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` as is, skipping file and environment loading.
    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the events to dispatch.
    pub fn registry(mut self, registry: EventRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Uses `store` regardless of `store.backend`.
    pub fn store(mut self, store: BoxedStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the platform permission predicate.
    pub fn permissions(mut self, permissions: Arc<dyn PermissionSource>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Binds `handle` to the dispatcher once it is built.
    pub fn handle(mut self, handle: DispatcherHandle) -> Self {
        self.handles.push(handle);
        self
    }

    /// Builds against `slot` instead of the process-wide one.
    pub fn slot(mut self, slot: &'static InstanceSlot) -> Self {
        self.slot = slot;
        self
    }

    /// Leaves the global subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads configuration, initializes logging, and builds the dispatcher.
    pub async fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = match self.config {
            Some(config) => {
                validate_config(&config)?;
                config
            }
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let store = self.store.or_else(|| match config.store.backend {
            StoreBackend::None => None,
            StoreBackend::Memory => Some(Arc::new(MemoryStore::new()) as BoxedStore),
        });

        let mut builder = Dispatcher::builder(config.bot.to_bot_info())
            .registry(self.registry)
            .maybe_store(store);
        if let Some(permissions) = self.permissions {
            builder = builder.permissions(permissions);
        }
        for handle in self.handles {
            builder = builder.handle(handle);
        }
        let dispatcher = builder.build(self.slot).await?;

        info!(
            bot = %config.bot.name,
            store = %config.store.backend,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(HeraldRuntime {
            config,
            dispatcher,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
            running: AtomicBool::new(false),
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use herald_core::{ConfigurationError, EventInfo};

    use super::*;
    use crate::error::RuntimeError;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(counter: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_routes_inbound_events() {
        static SLOT: InstanceSlot = InstanceSlot::new();
        let (pings, mentions, joins) = (counter(), counter(), counter());

        let mut registry = EventRegistry::new();
        let hit = bump(&pings);
        registry
            .add_command(EventInfo::new("ping"), move |_, _| {
                hit();
                async { Ok(()) }
            })
            .unwrap();
        let hit = bump(&mentions);
        registry
            .add_mention(EventInfo::new("wave"), move |_, _| {
                hit();
                async { Ok(()) }
            })
            .unwrap();
        let hit = bump(&joins);
        registry
            .add_join(EventInfo::new("welcome"), move |_| {
                hit();
                async { Ok(()) }
            })
            .unwrap();

        let runtime = HeraldRuntime::builder()
            .config(HeraldConfig::default())
            .registry(registry)
            .slot(&SLOT)
            .without_logging()
            .build()
            .await
            .unwrap();
        assert!(runtime.dispatcher().has_store());

        let (tx, rx) = mpsc::channel(8);
        tx.send(InboundEvent::guild_message(Message::new(1, 2, 3, "!ping")))
            .await
            .unwrap();
        tx.send(InboundEvent::private_message(Message::new(1, 2, 3, "!ping")))
            .await
            .unwrap();
        tx.send(InboundEvent::Mention(Message::new(1, 2, 3, "@herald hi")))
            .await
            .unwrap();
        tx.send(InboundEvent::GuildJoin(Guild::new(3))).await.unwrap();
        drop(tx);

        runtime
            .run_until(rx, std::future::pending())
            .await
            .unwrap();

        assert_eq!(pings.load(Ordering::SeqCst), 1);
        assert_eq!(mentions.load(Ordering::SeqCst), 1);
        assert_eq!(joins.load(Ordering::SeqCst), 1);
        assert!(!runtime.is_running());
    }

    async fn explode(_: Arc<Message>, _: String) -> herald_core::HandlerResult {
        anyhow::bail!("exploded")
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_stop_runtime() {
        static SLOT: InstanceSlot = InstanceSlot::new();
        let pings = counter();

        let mut registry = EventRegistry::new();
        registry.add_command(EventInfo::new("boom"), explode).unwrap();
        let hit = bump(&pings);
        registry
            .add_command(EventInfo::new("ping"), move |_, _| {
                hit();
                async { Ok(()) }
            })
            .unwrap();

        let runtime = HeraldRuntime::builder()
            .config(HeraldConfig::default())
            .registry(registry)
            .slot(&SLOT)
            .without_logging()
            .build()
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(InboundEvent::guild_message(Message::new(1, 2, 3, "!boom")))
            .await
            .unwrap();
        tx.send(InboundEvent::guild_message(Message::new(1, 2, 3, "!ping")))
            .await
            .unwrap();
        drop(tx);

        runtime.run_until(rx, std::future::pending()).await.unwrap();
        assert_eq!(pings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_continuous_events_cancelled_on_shutdown() {
        static SLOT: InstanceSlot = InstanceSlot::new();
        let stopped = counter();

        let mut registry = EventRegistry::new();
        let hit = bump(&stopped);
        let hit = Arc::new(hit);
        registry
            .add_continuous(EventInfo::new("ticker"), move |token| {
                let hit = Arc::clone(&hit);
                async move {
                    token.cancelled().await;
                    hit();
                    Ok(())
                }
            })
            .unwrap();

        let runtime = HeraldRuntime::builder()
            .config(HeraldConfig::default())
            .registry(registry)
            .slot(&SLOT)
            .without_logging()
            .build()
            .await
            .unwrap();

        // Keep the sender alive so only the shutdown future ends the loop.
        let (_tx, rx) = mpsc::channel::<InboundEvent>(1);
        runtime.run_until(rx, async {}).await.unwrap();

        assert_eq!(stopped.load(Ordering::SeqCst), 1);
        assert!(runtime.shutdown_token().is_cancelled());
        assert_eq!(runtime.dispatcher().usage_count("ticker"), Some(1));
    }

    #[tokio::test]
    async fn test_store_backend_none() {
        static SLOT: InstanceSlot = InstanceSlot::new();
        let mut config = HeraldConfig::default();
        config.store.backend = StoreBackend::None;

        let runtime = HeraldRuntime::builder()
            .config(config)
            .slot(&SLOT)
            .without_logging()
            .build()
            .await
            .unwrap();
        assert!(!runtime.dispatcher().has_store());
    }

    #[tokio::test]
    async fn test_second_runtime_rejected() {
        static SLOT: InstanceSlot = InstanceSlot::new();
        let build = || {
            HeraldRuntime::builder()
                .config(HeraldConfig::default())
                .slot(&SLOT)
                .without_logging()
                .build()
        };

        let first = build().await;
        assert!(first.is_ok());
        let second = build().await;
        assert!(matches!(
            second,
            Err(RuntimeError::Dispatcher(DispatchError::Configuration(
                ConfigurationError::AlreadyConstructed { .. }
            )))
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_leaves_slot_free() {
        static SLOT: InstanceSlot = InstanceSlot::new();
        let mut config = HeraldConfig::default();
        config.bot.default_prefix = "LOUD!".into();

        let result = HeraldRuntime::builder()
            .config(config)
            .slot(&SLOT)
            .without_logging()
            .build()
            .await;
        assert!(matches!(result, Err(RuntimeError::Config(_))));
        assert!(!SLOT.is_claimed());
    }

    #[tokio::test]
    async fn test_builder_binds_handles() {
        static SLOT: InstanceSlot = InstanceSlot::new();
        let handle = DispatcherHandle::new();

        let runtime = HeraldRuntime::builder()
            .config(HeraldConfig::default())
            .handle(handle.clone())
            .slot(&SLOT)
            .without_logging()
            .build()
            .await
            .unwrap();

        let bound = handle.get().unwrap();
        assert!(Arc::ptr_eq(&bound, runtime.dispatcher()));
        assert_eq!(bound.bot_name(), "Herald");
    }
}
