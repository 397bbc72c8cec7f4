//! Console Bot Example
//!
//! A Herald bot whose "platform" is the terminal. Every line read from stdin
//! becomes an inbound event for one fixed user, channel and guild:
//!
//! ```text
//! !ping              guild message (routed through prefixes and commands)
//! herald.ping        same command through the override prefix
//! @hello             message mentioning the bot
//! /dm !ping          private message (ignored)
//! /join   /leave     the bot joins or leaves the guild
//! ```
//!
//! Replies are printed to stdout. Try `!help`, `!prefix ?` (with `--admin`),
//! `!toggle ping` and `!stats` (with `--developer`).
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --admin --developer
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use herald::prelude::*;
use herald::runtime::ConfigLoader;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(version, about = "Drive a Herald bot from the terminal")]
struct Args {
    /// Configuration file (defaults to searching for herald.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bot name, overriding the configuration
    #[arg(long)]
    name: Option<String>,

    /// Default prefix, overriding the configuration
    #[arg(long)]
    prefix: Option<String>,

    /// User id the console types as
    #[arg(long, default_value_t = 1000)]
    user: UserId,

    /// Channel id of the console
    #[arg(long, default_value_t = 20)]
    channel: ChannelId,

    /// Guild id of the console
    #[arg(long, default_value_t = 300)]
    guild: GuildId,

    /// Grant the console user manage permissions
    #[arg(long)]
    admin: bool,

    /// Add the console user to the developer list
    #[arg(long)]
    developer: bool,

    /// Seconds between heartbeat lines, 0 to disable
    #[arg(long, default_value_t = 0)]
    heartbeat: u64,
}

fn running(handle: &DispatcherHandle) -> Result<Arc<Dispatcher>> {
    handle.get().context("dispatcher is not running")
}

/// Adapts a handler that needs the dispatcher into a command handler.
fn with_dispatcher<H, Fut>(
    handle: &DispatcherHandle,
    handler: H,
) -> impl Fn(Arc<Message>, String) -> Fut + Send + Sync + 'static
where
    H: Fn(DispatcherHandle, Arc<Message>, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let handle = handle.clone();
    move |msg, prefix| handler(handle.clone(), msg, prefix)
}

fn reply(message: &Message, text: impl AsRef<str>) {
    println!("[#{}] herald> {}", message.channel_id, text.as_ref());
}

// ============================================================================
// Handler Functions
// ============================================================================

async fn ping(msg: Arc<Message>, _prefix: String) -> HandlerResult {
    reply(&msg, "Pong!");
    Ok(())
}

async fn echo(msg: Arc<Message>, _prefix: String) -> HandlerResult {
    reply(&msg, msg.arguments());
    Ok(())
}

async fn help(handle: DispatcherHandle, msg: Arc<Message>, prefix: String) -> HandlerResult {
    let listing = running(&handle)?.list_commands(&msg).await?;
    reply(&msg, format!("Commands (prefix `{prefix}`):\n{}", listing.trim_end()));
    Ok(())
}

async fn set_prefix(
    handle: DispatcherHandle,
    msg: Arc<Message>,
    _prefix: String,
) -> HandlerResult {
    let dispatcher = running(&handle)?;
    let requested = msg.arguments().trim().to_lowercase();
    if requested.is_empty() {
        let current = dispatcher.get_prefix(msg.guild_id).await?;
        reply(&msg, format!("Current prefix is `{current}`"));
        return Ok(());
    }
    dispatcher.set_prefix(msg.guild_id, requested.clone()).await?;
    reply(&msg, format!("Prefix set to `{requested}`"));
    Ok(())
}

async fn toggle(handle: DispatcherHandle, msg: Arc<Message>, _prefix: String) -> HandlerResult {
    let dispatcher = running(&handle)?;
    let name = msg.arguments().trim().to_lowercase();
    let Some(event) = dispatcher.get_event(&name) else {
        reply(&msg, format!("No event named `{name}`"));
        return Ok(());
    };

    let enabled = dispatcher.is_enabled(&event, msg.channel_id).await?;
    if dispatcher.set_enabled(&name, msg.channel_id, !enabled).await? {
        let state = if enabled { "disabled" } else { "enabled" };
        reply(&msg, format!("`{name}` is now {state} here"));
    } else {
        reply(&msg, format!("`{name}` cannot be disabled"));
    }
    Ok(())
}

async fn stats(handle: DispatcherHandle, msg: Arc<Message>, _prefix: String) -> HandlerResult {
    let dispatcher = running(&handle)?;
    let ping_uses = dispatcher.usage_count("ping").unwrap_or_default();
    reply(
        &msg,
        format!(
            "{} commands run in total, ping {} times",
            dispatcher.total_usage(),
            ping_uses
        ),
    );
    Ok(())
}

async fn fail(_msg: Arc<Message>, _prefix: String) -> HandlerResult {
    anyhow::bail!("this command always fails")
}

async fn greet(msg: Arc<Message>, _prefix: String) -> HandlerResult {
    reply(&msg, "You called?");
    Ok(())
}

async fn audit(msg: Arc<Message>, command: Arc<Event>) -> HandlerResult {
    info!(
        command = %command.name(),
        author = msg.author_id,
        uses = command.usage_count(),
        "Command completed"
    );
    Ok(())
}

async fn welcome(guild: Guild) -> HandlerResult {
    println!("herald> Hello, guild {}!", guild.id);
    Ok(())
}

async fn farewell(guild: Guild) -> HandlerResult {
    println!("herald> Goodbye, guild {}.", guild.id);
    Ok(())
}

async fn heartbeat(period: Duration, token: CancellationToken) -> HandlerResult {
    let mut ticks = 0u64;
    loop {
        tokio::select! {
            () = token.cancelled() => return Ok(()),
            () = tokio::time::sleep(period) => {
                ticks += 1;
                println!("herald> heartbeat {ticks}");
            }
        }
    }
}

fn build_registry(handle: &DispatcherHandle, heartbeat_secs: u64) -> Result<EventRegistry> {
    let mut registry = EventRegistry::new();
    let general = Module::new("General");
    let admin = Module::new("Admin");

    registry.add_command(
        EventInfo::new("ping")
            .description("Check that the bot is alive")
            .module(general.clone()),
        ping,
    )?;
    registry.add_command(
        EventInfo::new("echo")
            .alias("say")
            .description("Repeat the arguments")
            .usage("echo <text>")
            .module(general.clone()),
        echo,
    )?;
    registry.add_command(
        EventInfo::new("help")
            .alias("commands")
            .description("List the commands you can use here")
            .can_be_disabled(false),
        with_dispatcher(handle, help),
    )?;
    registry.add_command(
        EventInfo::new("fail")
            .description("Demonstrate handler errors")
            .error_message("That went about as well as expected."),
        fail,
    )?;
    registry.add_command(
        EventInfo::new("prefix")
            .usage("prefix [new prefix]")
            .accessibility(Accessibility::AdminOnly)
            .module(admin.clone()),
        with_dispatcher(handle, set_prefix),
    )?;
    registry.add_command(
        EventInfo::new("toggle")
            .usage("toggle <event>")
            .accessibility(Accessibility::AdminOnly)
            .can_be_disabled(false)
            .module(admin),
        with_dispatcher(handle, toggle),
    )?;
    registry.add_command(
        EventInfo::new("stats")
            .accessibility(Accessibility::DeveloperOnly)
            .module(Module::new("Developer")),
        with_dispatcher(handle, stats),
    )?;

    registry.add_mention(EventInfo::new("greet"), greet)?;
    registry.add_command_done(EventInfo::new("audit"), audit)?;
    registry.add_join(EventInfo::new("welcome"), welcome)?;
    registry.add_leave(EventInfo::new("farewell"), farewell)?;

    if heartbeat_secs > 0 {
        let period = Duration::from_secs(heartbeat_secs);
        registry.add_continuous(EventInfo::new("heartbeat"), move |token| {
            heartbeat(period, token)
        })?;
    }

    Ok(registry)
}

/// Turns one console line into an inbound event.
fn parse_line(line: &str, args: &Args) -> Option<InboundEvent> {
    let line = line.trim_end();
    if line.is_empty() {
        return None;
    }
    let message = |content: &str| Message::new(args.user, args.channel, args.guild, content);

    let event = match line {
        "/join" => InboundEvent::GuildJoin(Guild::new(args.guild)),
        "/leave" => InboundEvent::GuildLeave(Guild::new(args.guild)),
        _ if line.starts_with("/dm ") => InboundEvent::private_message(message(&line[4..])),
        _ if line.starts_with('@') => InboundEvent::Mention(message(line)),
        _ => InboundEvent::guild_message(message(line)),
    };
    Some(event)
}

async fn read_console(args: Arc<Args>, tx: mpsc::Sender<InboundEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if let Some(event) = parse_line(&line, &args)
                    && tx.send(event).await.is_err()
                {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {:?}", e);
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arc::new(Args::parse());

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    if let Some(name) = &args.name {
        config.bot.name.clone_from(name);
    }
    if let Some(prefix) = &args.prefix {
        config.bot.default_prefix.clone_from(prefix);
    }
    if args.developer {
        config.bot.developers.push(args.user);
    }

    let admin = args.admin.then_some(args.user);
    let permissions: Arc<dyn PermissionSource> =
        Arc::new(move |user: UserId, _channel: ChannelId| Some(user) == admin);

    let handle = DispatcherHandle::new();
    let runtime = HeraldRuntime::builder()
        .config(config)
        .registry(build_registry(&handle, args.heartbeat)?)
        .permissions(permissions)
        .handle(handle)
        .build()
        .await?;

    let dispatcher = runtime.dispatcher();
    println!(
        "{} is listening. Prefixes: `{}` and `{}`. Ctrl+D to quit.",
        dispatcher.bot_name(),
        dispatcher.get_prefix(args.guild).await?,
        dispatcher.override_prefix(),
    );

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(read_console(Arc::clone(&args), tx));

    runtime.run(rx).await?;
    Ok(())
}
