use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use deskshell::config::StartupOptions;
use deskshell::config_io::DirectoryContext;
use deskshell::environment::{AppEnvironment, Collaborators, LifecycleOutcome};
use deskshell::host;
use deskshell::ipc::{IpcBus, Request, Response};
use deskshell::services::{log_dirs, tracing_setup};
use deskshell::themes::defaults::prepare_environment;
use deskshell::themes::{DetachedPackageService, ThemeOptions};
use deskshell::window::headless::{HeadlessWindowFactory, Sink};
use deskshell::window::{ContentsId, LightNativeTheme};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Desktop application shell with theming and multi-window management
#[derive(Parser, Debug)]
#[command(name = "deskshell")]
#[command(about = "Desktop application shell driven over line-delimited JSON", long_about = None)]
#[command(version)]
struct Args {
    /// Enable verbose logging
    #[arg(long)]
    debug: bool,

    /// Log level used with --debug (e.g. 'trace', 'debug')
    #[arg(long, value_name = "LEVEL")]
    debug_level: Option<String>,

    /// Open developer tools in every new window
    #[arg(long)]
    with_devtools: bool,

    /// Don't check installed themes for updates
    #[arg(long)]
    skip_themes_update: bool,

    /// Don't run the application auto-updater
    #[arg(long)]
    skip_app_update: bool,

    /// Path to the settings file
    #[arg(long, value_name = "PATH")]
    settings_file: Option<PathBuf>,

    /// Directory where themes are installed
    #[arg(long, value_name = "PATH")]
    themes_path: Option<PathBuf>,

    /// Override the user data directory
    #[arg(long, value_name = "PATH")]
    user_data_dir: Option<PathBuf>,

    /// Application root served by the web-module scheme
    #[arg(long, value_name = "PATH")]
    app_root: Option<PathBuf>,

    /// Internal route to open in the first window
    #[arg(long, value_name = "ROUTE")]
    open: Option<String>,

    /// Path to log file (default: state directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Print the directories used by the shell and exit
    #[arg(long)]
    show_paths: bool,

    /// Print installed themes as JSON and exit
    #[arg(long)]
    list_themes: bool,

    /// Print the active theme as JSON and exit
    #[arg(long)]
    active_theme: bool,

    /// Activate a theme by id or name and exit
    #[arg(long, value_name = "ID")]
    activate_theme: Option<String>,

    /// Resolve a themes:// or web-module:// URL, print the body and exit
    #[arg(long, value_name = "URL")]
    resolve: Option<String>,
}

impl Args {
    fn startup_options(&self) -> StartupOptions {
        StartupOptions {
            debug: self.debug,
            debug_level: self.debug_level.clone(),
            with_devtools: self.with_devtools,
            skip_themes_update: self.skip_themes_update,
            skip_app_update: self.skip_app_update,
            settings_file: self.settings_file.clone(),
            themes_path: self.themes_path.clone(),
            user_data_dir: self.user_data_dir.clone(),
            app_root: self.app_root.clone(),
            open: self.open.clone(),
        }
    }

    fn is_one_shot(&self) -> bool {
        self.list_themes
            || self.active_theme
            || self.activate_theme.is_some()
            || self.resolve.is_some()
    }
}

fn main() -> AnyhowResult<()> {
    let args = Args::parse();
    let options = args.startup_options();

    // Handle --show-paths early (no logging setup, nothing created on disk)
    if args.show_paths {
        let dirs = DirectoryContext::resolve(&options)
            .context("Failed to resolve application directories")?;
        log_dirs::print_all_paths(&dirs);
        return Ok(());
    }

    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(log_dirs::main_log_path);
    if !tracing_setup::init_global(&log_path, options.log_level()) {
        eprintln!("Warning: unable to create log file {}", log_path.display());
    }
    log_dirs::cleanup_stale_logs();
    tracing::info!("Starting deskshell {}", env!("CARGO_PKG_VERSION"));

    let dirs = DirectoryContext::from_system(&options)
        .context("Failed to resolve application directories")?;
    if options.skip_app_update {
        tracing::info!("Application auto-update disabled");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    let result = if args.is_one_shot() {
        runtime.block_on(run_one_shot(&args, dirs, options))
    } else {
        runtime.block_on(run_shell(dirs, options))
    };
    // The stdin reader may still be parked on a blocking read
    runtime.shutdown_background();
    result
}

fn stdout_sink() -> Sink {
    Arc::new(Mutex::new(Box::new(std::io::stdout())))
}

fn collaborators(dirs: &DirectoryContext, sink: Sink) -> Collaborators {
    Collaborators::file_backed(
        dirs,
        Arc::new(HeadlessWindowFactory::new(sink)),
        Arc::new(LightNativeTheme),
        Arc::new(DetachedPackageService),
    )
}

/// Drive the shell from stdin until the host closes the stream or the last
/// window closes.
async fn run_shell(dirs: DirectoryContext, options: StartupOptions) -> AnyhowResult<()> {
    let sink = stdout_sink();
    let mut environment = AppEnvironment::new(
        dirs.clone(),
        options,
        collaborators(&dirs, Arc::clone(&sink)),
    );
    environment
        .start()
        .await
        .context("Failed to initialize application")?;

    let (bus, inbox) = IpcBus::channel(64);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let bridge = tokio::spawn(host::serve(stdin, bus, sink));

    let outcome = environment.run(inbox).await;
    tracing::info!("Shell stopped ({:?})", outcome);
    if outcome == LifecycleOutcome::Quit {
        bridge.abort();
        return Ok(());
    }
    match bridge.await {
        Ok(result) => result.context("Host bridge failed"),
        Err(e) => Err(anyhow::anyhow!("Host bridge task failed: {e}")),
    }
}

async fn run_one_shot(
    args: &Args,
    dirs: DirectoryContext,
    options: StartupOptions,
) -> AnyhowResult<()> {
    prepare_environment(&dirs)
        .await
        .context("Failed to prepare the themes directory")?;
    let mut environment = AppEnvironment::with_theme_options(
        dirs.clone(),
        options,
        collaborators(&dirs, stdout_sink()),
        ThemeOptions {
            skip_update_check: true,
            ..Default::default()
        },
    );

    if let Some(url) = &args.resolve {
        let resource = environment
            .schemes()
            .resolve_url(url)
            .await
            .with_context(|| format!("Unable to resolve {url}"))?;
        eprintln!("Content-Type: {}", resource.mime_type);
        std::io::stdout()
            .write_all(resource.body.as_bytes())
            .context("Failed to write resource")?;
        return Ok(());
    }

    let request = if let Some(id) = &args.activate_theme {
        Request::ActivateTheme { id: id.clone() }
    } else if args.active_theme {
        Request::ActiveThemeInfo
    } else {
        Request::ListThemes
    };
    let response = environment.handle_request(ContentsId(0), request).await?;
    match response {
        Response::Ack => println!("Theme activated"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}
