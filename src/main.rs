//! Nexus Userbot - Main Entry Point
//!
//! Runs prefix commands typed by your own Telegram account, plugin commands
//! and, optionally, a companion bot account with public commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use clap::Parser;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use dialoguer::{Input, Password};
use qrcode::QrCode;
use qrcode::render::unicode::Dense1x2;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use nexus_userbot::assistant::{Assistant, AutoResponder, LogReporter};
use nexus_userbot::commands::{
    AliasResolver, BotInfo, CommandRegistry, CooldownLedger, DEFAULT_ALIASES, DispatchOutcome,
    Dispatcher, DispatcherConfig, PrunedLedger, UsageCounter, prune_ledgers, register_builtins,
    register_plugin_commands, reserved_names,
};
use nexus_userbot::config::{AssistantSettings, BotSettings, TelegramConfig};
use nexus_userbot::plugins::{
    PluginCatalog, PluginHost, PluginInstaller, PluginLoader, PluginManager, bundled,
};
use nexus_userbot::telegram::{
    AuthError, QrAuthResult, ResponseMode, RouteTable, SendThrottle, TelegramBot, Transport,
};

/// Seconds between QR login token refreshes.
const QR_POLL_SECS: u64 = 5;

/// Telegram userbot with prefix commands and hot-loadable plugins.
#[derive(Parser, Debug)]
#[command(name = "nexus_userbot")]
#[command(about = "Telegram userbot with prefix commands and hot-loadable plugins")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log in by scanning a QR code instead of entering a login code.
    #[arg(long)]
    qr_login: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;
    let settings = BotSettings::from_env_with_defaults();
    let assistant_settings = AssistantSettings::from_env_with_defaults();

    // Connect to Telegram
    let bot = TelegramBot::connect(
        tg_config.api_id,
        &tg_config.session_path,
        ResponseMode::EditInPlace,
        SendThrottle::from_millis(settings.rate_limit_delay_ms),
    )
    .await
    .context("Failed to connect to Telegram")?;

    // Handle authentication if needed
    if !bot.is_authorized().await.context("Failed to check authorization")? {
        if args.qr_login {
            qr_authenticate(&bot, &tg_config).await?;
        } else {
            authenticate(&bot, &tg_config).await?;
        }
    }

    let bot = Arc::new(bot);
    let me = bot.me().await.context("Failed to fetch account details")?;
    info!(
        "Logged in as {} (@{}, id {})",
        me.first_name,
        me.username.as_deref().unwrap_or("none"),
        me.id
    );

    // Plugins
    let http = reqwest::Client::builder()
        .timeout(settings.plugin_fetch_timeout())
        .build()
        .context("Failed to build HTTP client")?;
    tokio::fs::create_dir_all(&settings.plugins_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.plugins_dir.display()))?;

    let routes = Arc::new(RouteTable::new());
    let catalog = Arc::new(PluginCatalog::builtin(&settings.plugin_catalog_base));
    let manager = Arc::new(PluginManager::new(
        Arc::clone(&catalog),
        PluginInstaller::new(&settings.plugins_dir, catalog, http.clone()),
        PluginLoader::new(
            &settings.plugins_dir,
            PluginHost::new(Arc::clone(&routes), http.clone(), settings.command_prefix.clone())
                .with_reserved(reserved_names()),
            bundled::entry_points(),
        ),
    ));
    manager.load_all().await;

    // Commands
    let info = Arc::new(BotInfo::new(
        settings.bot_name.clone(),
        settings.bot_version.clone(),
        assistant_settings.enable_auto_response,
    ));
    let mut registry = CommandRegistry::new(Arc::new(UsageCounter::new()));
    register_builtins(&mut registry, &info);
    register_plugin_commands(&mut registry, &manager);

    let dispatcher = Arc::new(
        Dispatcher::new(
            DispatcherConfig::from_settings(&settings),
            registry,
            AliasResolver::from_pairs(DEFAULT_ALIASES),
            Arc::new(CooldownLedger::new()),
        )
        .context("Invalid command aliases")?,
    );

    info!("Starting {} v{}...", settings.bot_name, settings.bot_version);
    info!(
        "Command prefix: {} ({} commands, {} aliases)",
        settings.command_prefix,
        dispatcher.registry().len(),
        dispatcher.aliases().len()
    );

    // Companion bot
    let log_sink: Arc<dyn Transport> = Arc::clone(&bot) as Arc<dyn Transport>;
    let companion = match start_companion(
        &tg_config,
        &settings,
        &assistant_settings,
        &info,
        http,
        log_sink,
    )
    .await
    {
        Ok(companion) => companion,
        Err(e) => {
            warn!("Companion bot disabled: {:#}", e);
            None
        }
    };

    let responder = assistant_settings.enable_auto_response.then(|| {
        let username = companion
            .as_ref()
            .and_then(|(_, _, username)| username.clone());
        Arc::new(
            AutoResponder::new(
                assistant_settings.clone(),
                format!(
                    "🤖 Powered by {} v{}",
                    settings.bot_name, settings.bot_version
                ),
            )
            .with_bot_username(username),
        )
    });

    let companion = companion.map(|(companion_bot, assistant, _)| (companion_bot, Arc::new(assistant)));

    // Periodic cleanup of cooldown records
    let mut ledgers = vec![PrunedLedger {
        ledger: Arc::clone(dispatcher.cooldowns()),
        max_age: settings.command_cooldown(),
    }];
    if let Some((_, assistant)) = &companion {
        ledgers.push(PrunedLedger {
            ledger: Arc::clone(assistant.dispatcher().cooldowns()),
            max_age: Duration::from_secs(assistant_settings.public_command_cooldown_secs),
        });
    }
    let prune_handle = spawn_pruner(
        ledgers,
        responder.clone(),
        Duration::from_secs(settings.cooldown_prune_interval_secs),
    );

    let companion_handle = companion
        .map(|(companion_bot, assistant)| tokio::spawn(run_companion(companion_bot, assistant)));

    bot.start_updates().await;
    info!("Bot is running. Use Ctrl+C to stop.");

    tokio::select! {
        () = run_userbot(Arc::clone(&bot), dispatcher, routes, responder) => {
            warn!("Update stream ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    // Cleanup
    info!("Shutting down...");
    prune_handle.abort();
    if let Some(handle) = companion_handle {
        handle.abort();
    }
    bot.disconnect();

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Receives messages for the user account until the stream ends.
async fn run_userbot(
    bot: Arc<TelegramBot>,
    dispatcher: Arc<Dispatcher>,
    routes: Arc<RouteTable>,
    responder: Option<Arc<AutoResponder>>,
) {
    while let Some(message) = bot.next_message().await {
        let bot = Arc::clone(&bot);
        let dispatcher = Arc::clone(&dispatcher);
        let routes = Arc::clone(&routes);
        let responder = responder.clone();

        tokio::spawn(async move {
            let transport: &dyn Transport = bot.as_ref();

            if !message.outgoing {
                if let Some(responder) = responder
                    && let Err(e) = responder.handle(transport, &message).await
                {
                    warn!("Failed to send auto-response: {}", e);
                }
                return;
            }

            if routes.route(transport, &message).await.is_some() {
                return;
            }
            match dispatcher.dispatch(transport, &message).await {
                DispatchOutcome::HandlerError(detail) => {
                    debug!("Command failed: {}", detail);
                }
                outcome => debug!("Dispatch outcome: {:?}", outcome),
            }
        });
    }
}

/// Connects and signs in the companion bot, if configured.
async fn start_companion(
    tg_config: &TelegramConfig,
    settings: &BotSettings,
    assistant_settings: &AssistantSettings,
    info: &Arc<BotInfo>,
    http: reqwest::Client,
    log_sink: Arc<dyn Transport>,
) -> Result<Option<(Arc<TelegramBot>, Assistant, Option<String>)>> {
    let Some(token) = assistant_settings.bot_token.as_deref() else {
        return Ok(None);
    };
    if !assistant_settings.enable_public_commands {
        info!("Public commands are disabled, companion bot not started");
        return Ok(None);
    }

    let companion_bot = TelegramBot::connect(
        tg_config.api_id,
        &assistant_settings.session_path,
        ResponseMode::ReplyOnce,
        SendThrottle::from_millis(settings.rate_limit_delay_ms),
    )
    .await
    .context("Failed to connect companion bot")?;

    if !companion_bot.is_authorized().await? {
        companion_bot
            .bot_sign_in(token, &tg_config.api_hash)
            .await
            .context("Companion bot sign in failed")?;
    }

    let bot_me = companion_bot.me().await?;
    info!(
        "Companion bot running as @{}",
        bot_me.username.as_deref().unwrap_or("unknown")
    );

    let reporter = LogReporter::from_settings(assistant_settings, log_sink);
    if let Some(reporter) = &reporter {
        info!("Reporting companion bot activity to chat {}", reporter.chat_id());
    }
    let assistant = Assistant::new(assistant_settings.clone(), info, http)
        .context("Invalid companion bot commands")?
        .with_reporter(reporter);
    companion_bot.start_updates().await;
    Ok(Some((Arc::new(companion_bot), assistant, bot_me.username)))
}

/// Receives messages for the companion bot until the stream ends.
async fn run_companion(bot: Arc<TelegramBot>, assistant: Arc<Assistant>) {
    while let Some(message) = bot.next_message().await {
        let bot = Arc::clone(&bot);
        let assistant = Arc::clone(&assistant);
        tokio::spawn(async move {
            let outcome = assistant.handle(bot.as_ref(), &message).await;
            debug!("Companion dispatch outcome: {:?}", outcome);
        });
    }
    warn!("Companion bot update stream ended");
}

/// Evicts expired cooldown and flood records on an interval.
fn spawn_pruner(
    ledgers: Vec<PrunedLedger>,
    responder: Option<Arc<AutoResponder>>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let now = Instant::now();
            let mut removed = prune_ledgers(&ledgers, now).await;
            if let Some(responder) = &responder {
                removed += responder.prune(now).await;
            }
            if removed > 0 {
                debug!("Pruned {} expired cooldown record(s)", removed);
            }
        }
    })
}

/// Handles Telegram authentication.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("Authentication required");

    let phone: String = Input::new()
        .with_prompt("Enter your phone number (with country code)")
        .interact_text()?;

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => {
            info!("Successfully signed in!");
            Ok(())
        }
        Err(AuthError::PasswordRequired(mut password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint").to_owned();
            info!("Password hint: {}", hint);

            loop {
                let password: String = Password::new()
                    .with_prompt("Enter your 2FA password")
                    .interact()?;

                match bot.check_password(password_token, &password).await {
                    Ok(()) => break,
                    Err(AuthError::InvalidPassword(token)) => {
                        error!("Invalid password, try again");
                        password_token = token;
                    }
                    Err(e) => return Err(e).context("2FA authentication failed"),
                }
            }

            info!("Successfully signed in with 2FA!");
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}

/// Logs in by showing a `tg://login` QR code until it is scanned.
async fn qr_authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("QR login requested");

    loop {
        match bot
            .export_login_token(config.api_id, &config.api_hash)
            .await
            .context("Failed to export login token")?
        {
            QrAuthResult::Token { token, expires } => {
                show_login_qr(&token, expires)?;
                tokio::time::sleep(Duration::from_secs(QR_POLL_SECS)).await;
            }
            QrAuthResult::Success { user_id, username } => {
                info!(
                    "Successfully signed in as {} ({})",
                    username.as_deref().unwrap_or("user"),
                    user_id
                );
                return Ok(());
            }
            QrAuthResult::PasswordRequired => {
                info!("Two-factor authentication is enabled, continuing with phone login");
                return authenticate(bot, config).await;
            }
            QrAuthResult::MigrateTo { dc_id } => {
                bail!("Account lives on DC {dc_id}; QR login cannot migrate, use phone login");
            }
        }
    }
}

/// Clears the terminal and renders the login QR code.
fn show_login_qr(token: &[u8], expires: i32) -> Result<()> {
    let url = format!("tg://login?token={}", URL_SAFE_NO_PAD.encode(token));
    let code = QrCode::new(url.as_bytes()).context("Failed to encode login QR code")?;
    let rendered = code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .build();

    execute!(std::io::stdout(), Clear(ClearType::All), MoveTo(0, 0))?;
    println!("Scan this QR code with Telegram (Settings > Devices > Link Desktop Device):\n");
    println!("{rendered}");

    let remaining = i64::from(expires) - chrono::Utc::now().timestamp();
    println!("\nThe code refreshes automatically ({remaining}s until it expires).");
    Ok(())
}
