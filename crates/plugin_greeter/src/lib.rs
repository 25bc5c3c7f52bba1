use owl_core::{
    Command, CommandResult, Component, ConfigManager, Configurable, EventListener, InitFlag,
    ListenerError, ListenerId, OwlContext, OwlError, OwlPlugin, Result, Service, ServiceStatus,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Custom config file owned by this plugin
pub const CONFIG_FILE: &str = "greeter.yml";

const DEFAULT_CONFIG: &str = "\
# Greeter settings
welcome-message: \"Welcome to the server, {player}!\"
announce-joins: true
";

const DEFAULT_TEMPLATE: &str = "Welcome to the server, {player}!";

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoinEvent {
    pub player: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerChatEvent {
    pub player: String,
    pub message: String,
}

/// Published after a joining player has been welcomed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeEvent {
    pub player: String,
    pub welcome_message: String,
    pub welcome_count: u32,
}

// ============================================================================
// Welcome service
// ============================================================================

/// Formats welcome messages and counts how many were handed out.
pub struct WelcomeService {
    init: InitFlag,
    template: RwLock<String>,
    welcome_count: AtomicU32,
}

impl WelcomeService {
    pub const ID: &'static str = "greeter.welcome";

    pub fn new() -> Self {
        Self {
            init: InitFlag::new(),
            template: RwLock::new(DEFAULT_TEMPLATE.to_string()),
            welcome_count: AtomicU32::new(0),
        }
    }

    pub fn set_template(&self, template: &str) {
        *self.template.write() = template.to_string();
    }

    pub fn template(&self) -> String {
        self.template.read().clone()
    }

    /// Render the welcome for `player` and bump the counter. Returns the
    /// message and the new count.
    pub fn welcome(&self, player: &str) -> (String, u32) {
        let message = self.template.read().replace("{player}", player);
        let count = self.welcome_count.fetch_add(1, Ordering::SeqCst) + 1;
        (message, count)
    }

    pub fn welcome_count(&self) -> u32 {
        self.welcome_count.load(Ordering::SeqCst)
    }
}

impl Default for WelcomeService {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for WelcomeService {
    fn id(&self) -> &str {
        Self::ID
    }

    fn initialize(&self) -> Result<()> {
        if self.init.raise() {
            debug!("👋 WelcomeService started");
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        if self.init.lower() {
            info!("👋 WelcomeService stopped after {} welcome(s)", self.welcome_count());
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.init.get()
    }
}

impl Service for WelcomeService {
    fn service_name(&self) -> &str {
        "Welcome Service"
    }

    fn status(&self) -> ServiceStatus {
        if self.init.get() {
            ServiceStatus::Running
        } else {
            ServiceStatus::Stopped
        }
    }
}

// ============================================================================
// Listeners
// ============================================================================

/// Welcomes joining players and republishes the greeting as a
/// [`WelcomeEvent`].
pub struct JoinListener {
    ctx: OwlContext,
    service: Arc<WelcomeService>,
    announce: bool,
}

impl EventListener<PlayerJoinEvent> for JoinListener {
    fn on_event(&self, event: &PlayerJoinEvent) -> std::result::Result<(), ListenerError> {
        if event.player.trim().is_empty() {
            return Err(ListenerError::Rejected("join event without a player name".to_string()));
        }
        let (welcome_message, welcome_count) = self.service.welcome(&event.player);
        if self.announce {
            info!("👋 {}", welcome_message);
        }
        self.ctx
            .events()
            .publish(WelcomeEvent {
                player: event.player.clone(),
                welcome_message,
                welcome_count,
            })
            .map(|_| ())
            .map_err(ListenerError::failed)
    }

    fn name(&self) -> &str {
        "greeter.join"
    }
}

fn is_greeting(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| matches!(word, "hello" | "hi" | "hey"))
}

// ============================================================================
// Command
// ============================================================================

/// `/greet <player>`: welcome a player by hand.
pub struct GreetCommand {
    init: InitFlag,
    service: Arc<WelcomeService>,
}

impl Component for GreetCommand {
    fn id(&self) -> &str {
        "greet"
    }

    fn initialize(&self) -> Result<()> {
        self.init.raise();
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        self.init.lower();
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.init.get()
    }
}

impl Command for GreetCommand {
    fn execute(&self, params: &[&str]) -> CommandResult {
        match params {
            [player] => CommandResult::success(self.service.welcome(player).0),
            _ => CommandResult::failure(format!("Usage: {}", self.usage())),
        }
    }

    fn can_execute(&self, params: &[&str]) -> bool {
        params.len() == 1
    }

    fn usage(&self) -> &str {
        "/greet <player>"
    }

    fn description(&self) -> &str {
        "Send the welcome message for a player"
    }
}

// ============================================================================
// Plugin
// ============================================================================

struct Settings {
    welcome_message: String,
    announce_joins: bool,
}

/// A simple greeter plugin that welcomes players as they join
pub struct GreeterPlugin {
    service: Arc<WelcomeService>,
    command: Arc<GreetCommand>,
    settings: RwLock<Settings>,
    listeners: Mutex<Vec<ListenerId>>,
}

impl GreeterPlugin {
    pub fn new() -> Self {
        let service = Arc::new(WelcomeService::new());
        Self {
            command: Arc::new(GreetCommand {
                init: InitFlag::new(),
                service: service.clone(),
            }),
            service,
            settings: RwLock::new(Settings {
                welcome_message: DEFAULT_TEMPLATE.to_string(),
                announce_joins: true,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn service(&self) -> Arc<WelcomeService> {
        self.service.clone()
    }

    pub fn welcome_message(&self) -> String {
        self.settings.read().welcome_message.clone()
    }
}

impl Default for GreeterPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurable for GreeterPlugin {
    fn load_config(&self, config: &ConfigManager, path: Option<&str>) -> Result<()> {
        let file = path.unwrap_or(CONFIG_FILE);
        config.register_default_resource(CONFIG_FILE, DEFAULT_CONFIG);
        let loaded = config.load_custom_config(file)?;

        let mut settings = self.settings.write();
        settings.welcome_message = loaded.get_string("welcome-message", DEFAULT_TEMPLATE);
        settings.announce_joins = loaded.get_bool("announce-joins", true);
        self.service.set_template(&settings.welcome_message);
        debug!("👋 GreeterPlugin: loaded settings from {}", file);
        Ok(())
    }

    fn save_config(&self, config: &ConfigManager) -> Result<()> {
        let settings = self.settings.read();
        config.set_custom_value(CONFIG_FILE, "welcome-message", settings.welcome_message.as_str())?;
        config.set_custom_value(CONFIG_FILE, "announce-joins", settings.announce_joins)
    }

    fn reset_to_default_config(&self, config: &ConfigManager) -> Result<()> {
        config.register_default_resource(CONFIG_FILE, DEFAULT_CONFIG);
        config.save_resource(CONFIG_FILE, true)?;
        self.load_config(config, None)
    }

    fn validate_config(&self) -> bool {
        self.settings.read().welcome_message.contains("{player}")
    }
}

impl OwlPlugin for GreeterPlugin {
    fn id(&self) -> &str {
        "greeter"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn components(&self, _ctx: &OwlContext) -> Vec<Arc<dyn Component>> {
        let service: Arc<dyn Component> = self.service.clone();
        let command: Arc<dyn Component> = self.command.clone();
        vec![service, command]
    }

    fn on_enable(&self, ctx: &OwlContext) -> Result<()> {
        info!("👋 GreeterPlugin: Registering services and handlers...");
        ctx.services().register_service(self.service.clone())?;

        let join = Arc::new(JoinListener {
            ctx: ctx.clone(),
            service: self.service.clone(),
            announce: self.settings.read().announce_joins,
        });
        let mut listeners = self.listeners.lock();
        listeners.push(ctx.events().register::<PlayerJoinEvent, _>(join)?);
        listeners.push(ctx.events().subscribe("greeter.chat", |event: &PlayerChatEvent| {
            if is_greeting(&event.message) {
                info!("👋 GreeterPlugin: {} says hello!", event.player);
            }
            Ok(())
        })?);

        ctx.commands().register(self.command.clone());
        info!("👋 GreeterPlugin: ✅ Ready to welcome players!");
        Ok(())
    }

    fn on_disable(&self, ctx: &OwlContext) -> Result<()> {
        // Each step runs even if an earlier one failed; this may follow a
        // partial on_enable or a core that is already disabled.
        for id in self.listeners.lock().drain(..) {
            match ctx.events().unregister_id(id) {
                Ok(_) | Err(OwlError::NotInitialized(_)) => {}
                Err(e) => warn!("👋 GreeterPlugin: failed to unregister listener {}: {}", id, e),
            }
        }
        ctx.commands().unregister(self.command.id());
        match ctx.services().unregister_service::<WelcomeService>() {
            Ok(_) | Err(OwlError::NotInitialized(_)) => {}
            Err(e) => warn!("👋 GreeterPlugin: failed to unregister service: {}", e),
        }
        info!(
            "👋 GreeterPlugin: Shutting down after welcoming {} player(s)",
            self.service.welcome_count()
        );
        Ok(())
    }
}
