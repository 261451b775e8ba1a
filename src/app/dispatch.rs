//! Entry dispatcher: parses arguments, bootstraps the registry, picks a mode.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{ArgGroup, Parser};
use tokio::io::BufReader;
use tracing::{debug, info};

use super::output::SharedOutput;
use super::session::Session;
use crate::config::{RegistryConfig, ServeConfig, DEFAULT_PING_INTERVAL};
use crate::core::desktop::DesktopRegistry;
use crate::core::protocol::entry_line;
use crate::core::registry::Registry;

/// Exit status for every usage error (missing, unknown, or conflicting
/// arguments).
pub const USAGE_EXIT_CODE: u8 = 2;

// ───────────────────────────────────────── CLI ───────────────

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Report installed applications and their labels",
    group(ArgGroup::new("mode").multiple(false))
)]
struct Cli {
    /// Print the label of this package identifier (nothing if unknown).
    #[arg(group = "mode")]
    package: Option<String>,

    /// Print `identifier:label` for every installed application and exit.
    #[arg(long = "list-all", group = "mode")]
    list_all: bool,

    /// Serve the line protocol on stdin/stdout.
    #[arg(long, group = "mode")]
    serve: bool,

    /// Milliseconds between `ping:` lines in serve mode.
    #[arg(
        long = "ping-interval-ms",
        value_name = "MS",
        default_value_t = DEFAULT_PING_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    ping_interval_ms: u64,

    /// Data directory to search for `applications/` (repeatable; replaces
    /// the XDG search path).
    #[arg(long = "data-dir", value_name = "PATH")]
    data_dirs: Vec<PathBuf>,
}

// ───────────────────────────────────────── modes ─────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Legacy single-shot lookup of one identifier.
    Lookup(String),
    ListAll,
    Serve,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub mode: Mode,
    pub data_dirs: Vec<PathBuf>,
    pub serve: ServeConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("Usage: {bin} <package-id> | --list-all | --serve", bin = env!("CARGO_PKG_NAME"))]
    MissingArgument,

    #[error("Unknown argument: {0}")]
    UnknownArgument(String),

    /// Help, version, conflicts and malformed values; clap renders these.
    #[error(transparent)]
    Clap(#[from] clap::Error),
}

/// Parse process arguments (program name first) into an [`Invocation`].
pub fn parse_args<I, T>(args: I) -> Result<Invocation, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::try_parse_from(args).map_err(|err| {
        if err.kind() == ErrorKind::UnknownArgument {
            if let Some(ContextValue::String(arg)) = err.get(ContextKind::InvalidArg) {
                return UsageError::UnknownArgument(arg.clone());
            }
        }
        UsageError::Clap(err)
    })?;

    let mode = if cli.list_all {
        Mode::ListAll
    } else if cli.serve {
        Mode::Serve
    } else if let Some(package) = cli.package {
        Mode::Lookup(package)
    } else {
        return Err(UsageError::MissingArgument);
    };

    Ok(Invocation {
        mode,
        data_dirs: cli.data_dirs,
        serve: ServeConfig {
            ping_interval: Duration::from_millis(cli.ping_interval_ms),
        },
    })
}

// ───────────────────────────────────────── run ───────────────

/// Bootstrap the registry and execute the selected mode.
pub async fn run(invocation: Invocation) -> anyhow::Result<()> {
    let config = RegistryConfig::load(&invocation.data_dirs);
    let registry: Arc<dyn Registry> = Arc::new(
        DesktopRegistry::open(&config.application_dirs, config.locale)
            .context("failed to obtain the application registry")?,
    );
    debug!(mode = ?invocation.mode, "dispatching");

    match invocation.mode {
        Mode::Lookup(identifier) => {
            single_shot(move || print_label(registry.as_ref(), &identifier, &mut io::stdout().lock()))
                .await
        }
        Mode::ListAll => {
            single_shot(move || print_listing(registry.as_ref(), &mut io::stdout().lock())).await
        }
        Mode::Serve => {
            let output = SharedOutput::new(tokio::io::stdout());
            let input = BufReader::new(tokio::io::stdin());
            let summary = Session::new(registry, output, invocation.serve)
                .run(input)
                .await?;
            info!(
                termination = ?summary.termination,
                commands = summary.commands,
                pings = summary.pings,
                "serve session finished"
            );
            Ok(())
        }
    }
}

async fn single_shot<F>(job: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .context("registry task panicked")?
}

/// Print the label for `identifier`, or nothing at all when it is unknown.
pub fn print_label(
    registry: &dyn Registry,
    identifier: &str,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match registry.label(identifier)? {
        Some(label) => writeln!(out, "{label}")?,
        None => debug!(%identifier, "not found; printing nothing"),
    }
    out.flush()?;
    Ok(())
}

/// Print `identifier:label` for every application, one per line.
pub fn print_listing(registry: &dyn Registry, out: &mut impl Write) -> anyhow::Result<()> {
    for record in registry.applications()? {
        writeln!(out, "{}", entry_line(&record))?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::testing::{BrokenRegistry, FixedRegistry};

    fn parse(args: &[&str]) -> Result<Invocation, UsageError> {
        parse_args(std::iter::once("app-labels").chain(args.iter().copied()))
    }

    #[test]
    fn no_arguments_is_a_usage_error() {
        assert!(matches!(parse(&[]), Err(UsageError::MissingArgument)));
    }

    #[test]
    fn selects_each_mode() {
        assert_eq!(parse(&["--serve"]).unwrap().mode, Mode::Serve);
        assert_eq!(parse(&["--list-all"]).unwrap().mode, Mode::ListAll);
        assert_eq!(
            parse(&["org.example.Editor"]).unwrap().mode,
            Mode::Lookup("org.example.Editor".into())
        );
    }

    #[test]
    fn serve_defaults_to_three_second_pings() {
        let invocation = parse(&["--serve"]).unwrap();
        assert_eq!(invocation.serve.ping_interval, Duration::from_secs(3));
        assert!(invocation.data_dirs.is_empty());
    }

    #[test]
    fn tuning_flags_are_applied() {
        let invocation = parse(&[
            "--serve",
            "--ping-interval-ms",
            "250",
            "--data-dir",
            "/a",
            "--data-dir",
            "/b",
        ])
        .unwrap();
        assert_eq!(invocation.serve.ping_interval, Duration::from_millis(250));
        assert_eq!(invocation.data_dirs, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn unknown_flag_uses_legacy_message() {
        let err = parse(&["--bogus"]).unwrap_err();
        assert_eq!(err.to_string(), "Unknown argument: --bogus");
    }

    #[test]
    fn modes_are_exclusive() {
        assert!(matches!(
            parse(&["--serve", "--list-all"]),
            Err(UsageError::Clap(_))
        ));
        assert!(matches!(
            parse(&["--serve", "org.example.Editor"]),
            Err(UsageError::Clap(_))
        ));
    }

    #[test]
    fn zero_ping_interval_is_rejected() {
        assert!(matches!(
            parse(&["--serve", "--ping-interval-ms", "0"]),
            Err(UsageError::Clap(_))
        ));
    }

    #[test]
    fn lookup_prints_label_or_nothing() {
        let registry = FixedRegistry::new([("org.example.Editor", "Editor")]);

        let mut out = Vec::new();
        print_label(&registry, "org.example.Editor", &mut out).unwrap();
        assert_eq!(out, b"Editor\n");

        let mut out = Vec::new();
        print_label(&registry, "com.example.app", &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn listing_prints_one_line_per_app() {
        let registry = FixedRegistry::new([("b", "Beta"), ("a", "Alpha: One")]);
        let mut out = Vec::new();
        print_listing(&registry, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a:Alpha: One\nb:Beta\n");
    }

    #[test]
    fn registry_failures_propagate() {
        let mut out = Vec::new();
        assert!(print_listing(&BrokenRegistry, &mut out).is_err());
        assert!(print_label(&BrokenRegistry, "x", &mut out).is_err());
    }

    #[tokio::test]
    async fn bootstrap_fails_without_registry() {
        let tmp = tempfile::tempdir().unwrap();
        let invocation = Invocation {
            mode: Mode::ListAll,
            data_dirs: vec![tmp.path().join("missing")],
            serve: ServeConfig::default(),
        };
        let err = run(invocation).await.unwrap_err();
        assert!(format!("{err:#}").contains("failed to obtain the application registry"));
    }
}
