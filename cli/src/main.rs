use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use usbmodem_client::busy::{BusySink, BusyState};
use usbmodem_client::error::RpcError;
use usbmodem_client::modem::types::{ModemInfo, UssdReply};
use usbmodem_client::modem::{ModemClient, list_modem_interfaces};
use usbmodem_client::monitor::{ModemStatus, StatusMonitor, fetch_sms_retrying};
use usbmodem_client::poll::{DEFAULT_POLL_INTERVAL_MS, Poller};
use usbmodem_client::rpc::RpcClient;
use usbmodem_client::transport::TransportError;
use usbmodem_client::ubus::{ANONYMOUS_SESSION, DEFAULT_BASE_URL, UbusConfig, UbusHttpTransport};

const MODEM_ABSENT_HINT: &str = "Modem not found. Please insert your modem to USB.";
const SMS_FETCH_ATTEMPTS: u32 = 3;
const SMS_RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no usbmodem interfaces configured; pass --interface to target one directly")]
    NoInterfaces,
    #[error("{}", MODEM_ABSENT_HINT)]
    ModemAbsent,
    #[error("command failed: {response}")]
    CommandFailed { response: String },
    #[error("call arguments must be a JSON object")]
    ArgsNotObject,
    #[error(transparent)]
    Rpc(RpcError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "usbmodem-cli", about = "Inspect and control usbmodem daemon modems over ubus")]
struct Cli {
    #[arg(long, env = "USBMODEM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// ubus session id; the anonymous one needs matching router ACLs.
    #[arg(long, env = "USBMODEM_SESSION", default_value = ANONYMOUS_SESSION)]
    session: String,

    /// Interface to address; defaults to the first discovered modem.
    #[arg(long, short = 'i', env = "USBMODEM_INTERFACE")]
    interface: Option<String>,

    /// Cadence for polling deferred results, in milliseconds.
    #[arg(long, env = "USBMODEM_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    poll_interval_ms: u64,

    /// Print a marker on stderr while the modem is busy with a deferred call.
    #[arg(long, default_value_t = false)]
    show_busy: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone)]
struct CliContext {
    transport: Arc<UbusHttpTransport>,
    interface: Option<String>,
    poll_interval_ms: u64,
    show_busy: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List router interfaces handled by the modem daemon.
    Interfaces,
    /// Show a status summary for the modem.
    Status(StatusArgs),
    /// Dump the full info payload as JSON.
    Info,
    /// Run a raw AT command.
    At(AtArgs),
    Ussd(UssdCommand),
    Sms(SmsCommand),
    Operators(OperatorsCommand),
    /// Call an arbitrary method on the modem object.
    Call(CallArgs),
}

#[derive(Args, Debug)]
struct StatusArgs {
    /// Keep polling and print every status change.
    #[arg(long, default_value_t = false)]
    watch: bool,
}

#[derive(Args, Debug)]
struct AtArgs {
    command: String,

    /// Daemon-side execution timeout, in milliseconds.
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,
}

#[derive(Args, Debug)]
struct UssdCommand {
    #[command(subcommand)]
    command: UssdSubcommand,
}

#[derive(Subcommand, Debug)]
enum UssdSubcommand {
    /// Send a USSD query such as *100#.
    Send {
        query: String,
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },
    /// Answer a USSD menu that is waiting for input.
    Reply {
        answer: String,
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
    },
    /// Drop the current USSD session.
    Cancel,
}

#[derive(Args, Debug)]
struct SmsCommand {
    #[command(subcommand)]
    command: SmsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SmsSubcommand {
    /// List stored messages.
    List {
        /// Print the raw JSON payload instead of a summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete messages by the ids shown in the listing.
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Args, Debug)]
struct OperatorsCommand {
    #[command(subcommand)]
    command: OperatorsSubcommand,
}

#[derive(Subcommand, Debug)]
enum OperatorsSubcommand {
    /// Scan for visible networks. Slow; the daemon defers it.
    Search,
    /// Register with a network from the scan list.
    Set {
        id: String,
        /// Raw technology id as reported by the scan.
        #[arg(long, default_value_t = 0)]
        tech: i32,
    },
    /// Return to automatic network selection.
    Auto,
}

#[derive(Args, Debug)]
struct CallArgs {
    method: String,

    /// JSON object of call arguments.
    #[arg(long, default_value = "{}")]
    data: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = UbusConfig {
        base_url: cli.base_url.trim_end_matches('/').to_string(),
        session: cli.session,
        ..UbusConfig::default()
    };
    let ctx = CliContext {
        transport: Arc::new(UbusHttpTransport::new(&config)?),
        interface: cli.interface,
        poll_interval_ms: cli.poll_interval_ms,
        show_busy: cli.show_busy,
    };

    match cli.command {
        Command::Interfaces => run_interfaces(&ctx).await,
        Command::Status(args) => run_status(&ctx, args).await,
        Command::Info => run_call(&ctx.modem().await?, "info", "{}").await,
        Command::At(args) => run_at(&ctx.modem().await?, args).await,
        Command::Ussd(ussd) => run_ussd(&ctx.modem().await?, ussd).await,
        Command::Sms(sms) => run_sms(&ctx.modem().await?, sms).await,
        Command::Operators(operators) => run_operators(&ctx.modem().await?, operators).await,
        Command::Call(args) => run_call(&ctx.modem().await?, &args.method, &args.data).await,
    }
}

impl CliContext {
    async fn modem(&self) -> Result<ModemClient, CliError> {
        let interface = match &self.interface {
            Some(name) => name.clone(),
            None => first_modem_interface(self.transport.as_ref()).await?,
        };
        let busy = if self.show_busy {
            BusyState::new(Arc::new(busy_marker) as Arc<dyn BusySink>)
        } else {
            BusyState::detached()
        };
        let rpc = RpcClient::new(
            self.transport.clone(),
            Poller::new(Duration::from_millis(self.poll_interval_ms)),
            busy,
        );
        Ok(ModemClient::new(rpc, interface))
    }
}

/// Rising edge only; the indicator clears itself when output resumes.
fn busy_marker(on: bool) {
    if on {
        eprintln!("waiting for the modem...");
    }
}

async fn first_modem_interface(transport: &UbusHttpTransport) -> Result<String, CliError> {
    let mut interfaces = list_modem_interfaces(transport).await?;
    if interfaces.is_empty() {
        return Err(CliError::NoInterfaces);
    }
    Ok(interfaces.remove(0).interface)
}

async fn run_interfaces(ctx: &CliContext) -> Result<(), CliError> {
    let interfaces = list_modem_interfaces(ctx.transport.as_ref()).await?;
    if interfaces.is_empty() {
        println!("no usbmodem interfaces configured");
        return Ok(());
    }
    for row in &interfaces {
        let device = row.l3_device.as_deref().or(row.device.as_deref()).unwrap_or("-");
        println!("{}\t{}\t{}", row.interface, if row.up { "up" } else { "down" }, device);
    }
    Ok(())
}

async fn run_status(ctx: &CliContext, args: StatusArgs) -> Result<(), CliError> {
    let modem = ctx.modem().await?;
    if !args.watch {
        match modem.info().await {
            Ok(info) => print_status(&info),
            Err(error) if error.is_device_absent() => println!("{MODEM_ABSENT_HINT}"),
            Err(error) => return Err(humanize(error)),
        }
        return Ok(());
    }

    let mut monitor = StatusMonitor::start(modem, Duration::from_millis(ctx.poll_interval_ms));
    while monitor.changed().await {
        match monitor.latest() {
            ModemStatus::Ready(info) => print_status(&info),
            ModemStatus::Absent => println!("{MODEM_ABSENT_HINT}"),
            ModemStatus::Failed(message) => println!("poll failed: {message}"),
            ModemStatus::Unknown => {}
        }
        println!();
    }
    Ok(())
}

fn print_status(info: &ModemInfo) {
    println!(
        "Modem:    {} {} (IMEI {})",
        info.modem.vendor, info.modem.model, info.modem.imei
    );

    let operator = if info.operator.name.is_empty() {
        info.operator.id.clone()
    } else {
        format!("{} ({})", info.operator.name, info.operator.id)
    };
    println!("Network:  {}, {}", info.network_status.name.label(), operator);

    let tech = &info.tech;
    if tech.name.is_empty() {
        println!("Tech:     {}", tech.tech().name());
    } else {
        println!("Tech:     {}", tech.name);
    }

    if let Some(rssi) = info.levels.rssi_dbm {
        match info.levels.quality {
            Some(quality) => println!("Signal:   {rssi} dBm ({quality:.0}%)"),
            None => println!("Signal:   {rssi} dBm"),
        }
    }

    println!("SIM:      {}", info.sim.state.label());
    if info.ipv4.is_configured() {
        println!("IPv4:     {}", info.ipv4.ip);
    }
    if info.ipv6.is_configured() {
        println!("IPv6:     {}", info.ipv6.ip);
    }
}

async fn run_at(modem: &ModemClient, args: AtArgs) -> Result<(), CliError> {
    let reply = modem.send_command(&args.command, args.timeout_ms).await.map_err(humanize)?;
    if reply.success == Some(false) {
        return Err(CliError::CommandFailed { response: reply.response });
    }
    println!("{}", reply.response.trim_end());
    Ok(())
}

async fn run_ussd(modem: &ModemClient, ussd: UssdCommand) -> Result<(), CliError> {
    match ussd.command {
        UssdSubcommand::Send { query, timeout_ms } => {
            print_ussd(&modem.send_ussd(&query, timeout_ms).await.map_err(humanize)?);
        }
        UssdSubcommand::Reply { answer, timeout_ms } => {
            print_ussd(&modem.reply_ussd(&answer, timeout_ms).await.map_err(humanize)?);
        }
        UssdSubcommand::Cancel => {
            modem.cancel_ussd().await.map_err(humanize)?;
            println!("ok");
        }
    }
    Ok(())
}

fn print_ussd(reply: &UssdReply) {
    if reply.discarded() {
        println!("(request discarded by the network)");
        return;
    }
    println!("{}", reply.response);
    if reply.wants_reply() {
        eprintln!("session open: answer with `ussd reply <text>` or close with `ussd cancel`");
    }
}

async fn run_sms(modem: &ModemClient, sms: SmsCommand) -> Result<(), CliError> {
    match sms.command {
        SmsSubcommand::List { json } => {
            if json {
                return run_call(modem, "read_sms", "{}").await;
            }
            let list = fetch_sms_retrying(
                modem,
                SMS_FETCH_ATTEMPTS,
                Duration::from_millis(SMS_RETRY_DELAY_MS),
            )
            .await
            .map_err(humanize)?;

            println!(
                "{} storage: {}/{} slots used",
                list.storage.label(),
                list.capacity.used,
                list.capacity.total
            );
            for message in &list.messages {
                let unread = if message.unread { ", unread" } else { "" };
                println!();
                println!(
                    "#{} [{}{unread}] {} {}",
                    message.id,
                    message.kind.label(),
                    message.addr,
                    format_time(message.time)
                );
                if message.invalid {
                    println!("(message is damaged or incomplete)");
                }
                println!("{}", message.text());
            }
            Ok(())
        }
        SmsSubcommand::Delete { ids } => {
            modem.delete_sms(&ids).await.map_err(humanize)?;
            println!("ok");
            Ok(())
        }
    }
}

async fn run_operators(modem: &ModemClient, operators: OperatorsCommand) -> Result<(), CliError> {
    match operators.command {
        OperatorsSubcommand::Search => {
            let found = modem.search_operators().await.map_err(humanize)?;
            if found.is_empty() {
                println!("no networks found");
                return Ok(());
            }
            for op in &found {
                let tech = if op.tech.name.is_empty() {
                    op.tech.tech().name()
                } else {
                    op.tech.name.as_str()
                };
                println!("{}\t{}\t{}\t{}", op.id, op.name, op.status.label(), tech);
            }
            Ok(())
        }
        OperatorsSubcommand::Set { id, tech } => {
            modem.set_operator(&id, tech).await.map_err(humanize)?;
            println!("ok");
            Ok(())
        }
        OperatorsSubcommand::Auto => {
            modem.set_operator_auto().await.map_err(humanize)?;
            println!("ok");
            Ok(())
        }
    }
}

async fn run_call(modem: &ModemClient, method: &str, data: &str) -> Result<(), CliError> {
    let parsed = serde_json::from_str::<Value>(data)?;
    let Value::Object(args) = parsed else {
        return Err(CliError::ArgsNotObject);
    };
    let payload = modem.rpc().call(modem.interface(), method, args).await.map_err(humanize)?;
    print_json(&payload)
}

fn humanize(error: RpcError) -> CliError {
    if error.is_device_absent() { CliError::ModemAbsent } else { CliError::Rpc(error) }
}

fn format_time(epoch: i64) -> String {
    time::OffsetDateTime::from_unix_timestamp(epoch)
        .ok()
        .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok())
        .unwrap_or_else(|| epoch.to_string())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
