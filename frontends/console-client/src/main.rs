use clap::Parser;
use console_client::picker::StdinPrompt;
use console_client::terminal::{spawn_stdio_events, RawModeGuard, StdioTerminal};
use console_client::{Console, StderrStatus, TerminalWidget};
use console_protocol::{ConsoleEndpoint, ConsoleError};
use std::path::PathBuf;
use std::sync::Mutex;

/// Open a console through a console broker.
#[derive(Debug, Parser)]
#[command(name = "console", version)]
struct Args {
    /// Console page URL, e.g. https://panel.example.com/console?server=3
    #[arg(env = "CONSOLE_URL")]
    url: String,

    /// Open a server console (replaces the URL query)
    #[arg(long, conflicts_with = "application")]
    server: Option<String>,

    /// Open an application console (replaces the URL query)
    #[arg(long)]
    application: Option<String>,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_tracing(log_file: Option<&PathBuf>) -> std::io::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "console=warn,console_client=warn".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = init_tracing(args.log_file.as_ref()) {
        eprintln!("Cannot open log file: {e}");
        std::process::exit(2);
    }

    // wss goes through rustls; pin the provider before the first handshake
    let _ = rustls::crypto::ring::default_provider().install_default();

    let code = exit_code(&run(args).await);
    // stdin is read on a blocking thread that would hold up runtime shutdown
    std::process::exit(code);
}

/// A console closed by the remote side (`exit`, logout) is a normal end.
fn exit_code(outcome: &Result<(), ConsoleError>) -> i32 {
    match outcome {
        Ok(()) | Err(ConsoleError::SocketClosed) => 0,
        Err(e) if e.is_cancellation() => 130,
        Err(_) => 1,
    }
}

async fn run(args: Args) -> Result<(), ConsoleError> {
    let mut endpoint = ConsoleEndpoint::parse(&args.url).inspect_err(|e| eprintln!("{e}"))?;
    if let Some(server) = &args.server {
        endpoint = endpoint.with_target("server", server);
    } else if let Some(application) = &args.application {
        endpoint = endpoint.with_target("application", application);
    }
    tracing::info!("Console page {}", endpoint.page());

    let mut console = Console::new(endpoint, StderrStatus).inspect_err(|e| eprintln!("{e}"))?;
    let mut prompt = StdinPrompt::default();
    let grant = console.establish(&mut prompt).await?;
    // Lines typed ahead of the answer are still buffered here
    let input = prompt.into_reader();

    let mut terminal = StdioTerminal::default();
    if let Some(target) = &grant.target {
        terminal.set_title(&format!("[Console] {}", target.label()));
    }

    let _raw = RawModeGuard::new();
    let mut events = spawn_stdio_events(input);
    console.attach(grant.credential, &mut terminal, &mut events).await
}
