//! Skylight CLI
//!
//! Inspect window-open feature strings and run a scripted multi-window
//! session against the in-memory event loop.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use skylight::window::{
    check_if_a_popup_window_is_requested, event_types, tokenize_features, EventListener,
    FeatureMap, FrameRequestCallback, IdleRequestCallback, IdleRequestOptions, PopupDecision,
};
use skylight::{EventLoop, NavigableRegistry, Value, WindowConfig, VERSION};

#[derive(Parser)]
#[command(name = "skylight")]
#[command(author, version, about = "Window open, messaging and scheduling core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize a window-open feature string and show the popup decision
    Features {
        /// The feature string, e.g. "width=400,height=300,noopener"
        features: String,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Run a scripted session: open a popup, exchange messages, drive
    /// idle callbacks and animation frames
    Demo {
        /// Window configuration (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Number of animation frames to tick
        #[arg(long, default_value_t = 3)]
        frames: u32,
    },
}

#[derive(Serialize)]
struct FeatureReport<'a> {
    features: &'a FeatureMap,
    popup: PopupDecision,
    noopener: bool,
    noreferrer: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Features { features, pretty } => show_features(&features, pretty),
        Commands::Demo { config, frames } => run_demo(config, frames),
    }
}

fn setup_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn show_features(input: &str, pretty: bool) -> Result<()> {
    let mut features = tokenize_features(input);
    let noopener = features
        .remove("noopener")
        .is_some_and(|v| skylight::window::parse_boolean_feature(&v));
    let noreferrer = features
        .remove("noreferrer")
        .is_some_and(|v| skylight::window::parse_boolean_feature(&v));

    let report = FeatureReport {
        features: &features,
        popup: check_if_a_popup_window_is_requested(&features),
        noopener: noopener || noreferrer,
        noreferrer,
    };

    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);
    Ok(())
}

fn run_demo(config_path: Option<PathBuf>, frames: u32) -> Result<()> {
    let config = match config_path {
        Some(path) => WindowConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => WindowConfig::default(),
    };

    println!("skylight {}", VERSION);

    let event_loop = Rc::new(EventLoop::with_config(&config));
    let registry = NavigableRegistry::new(event_loop.clone(), config);
    let main_window = registry.create_top_level("https://example.com/")?;

    let popup = main_window
        .open("", "_blank", "width=400,height=300")?
        .context("popup was not opened")?;
    println!(
        "opened popup {} (origin {})",
        popup.id(),
        popup.origin().ascii_serialization()
    );

    let log = Rc::new(RefCell::new(Vec::<String>::new()));

    let received = log.clone();
    popup.add_event_listener(
        event_types::MESSAGE,
        EventListener::new(move |event| {
            received
                .borrow_mut()
                .push(format!("message from {}: {}", event.origin, event.data));
            Ok(())
        }),
    );

    popup.post_message(&main_window, &Value::from("first"), "*", &[])?;
    popup.post_message(&main_window, &Value::from("second"), "/", &[])?;
    popup.post_message(&main_window, &Value::from("dropped"), "https://other.example", &[])?;

    for name in ["layout", "prefetch", "analytics"] {
        let ran = log.clone();
        main_window.request_idle_callback(
            IdleRequestCallback::new(move |deadline| {
                ran.borrow_mut().push(format!(
                    "idle {} ({:.1}ms left)",
                    name,
                    deadline.time_remaining()
                ));
                Ok(())
            }),
            IdleRequestOptions::default(),
        );
    }
    main_window.start_idle_period();

    let ticked = log.clone();
    main_window.request_animation_frame(FrameRequestCallback::new(move |now| {
        ticked.borrow_mut().push(format!("frame at {}ms", now));
        Ok(())
    }));

    let run = event_loop.run_until_idle();
    for frame in 0..frames {
        event_loop.advance_time(16.0);
        main_window.run_animation_frame_callbacks(event_loop.current_time());
        if frame == 0 {
            let ticked = log.clone();
            main_window.request_animation_frame(FrameRequestCallback::new(move |now| {
                ticked.borrow_mut().push(format!("follow-up frame at {}ms", now));
                Ok(())
            }));
        }
    }

    for line in log.borrow().iter() {
        println!("{}", line);
    }

    let stats = event_loop.stats();
    println!(
        "ran {} tasks ({} queued, longest queue {})",
        run.tasks_run, stats.total_tasks_queued, stats.max_queue_length
    );
    for exception in main_window.reported_exceptions() {
        println!("reported: {}", exception);
    }
    Ok(())
}
