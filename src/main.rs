mod app;
mod config;
mod draw;
mod error;
mod export;
mod images;
mod model;
mod service;
mod session;
mod store;

use clap::Parser;
use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app::ChartAnnotateApp;
use crate::config::{Config, LogLevel};
use crate::service::HttpChartService;

/// Mark axis calibration points and data series on chart images.
#[derive(Parser, Debug)]
#[command(name = "chart-annotate", version)]
struct Cli {
    /// Chart images to load at start-up
    images: Vec<PathBuf>,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the chart service
    #[arg(long)]
    service_url: Option<String>,

    /// Keep the batch in the given order instead of asking the service
    #[arg(long)]
    no_sort: bool,

    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Write the effective settings to the config file and exit
    #[arg(long)]
    write_config: bool,
}

fn config_path(cli: &Cli) -> error::Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_path(),
    }
}

fn load_config(cli: &Cli) -> (Config, Option<String>) {
    let path = match config_path(cli) {
        Ok(path) => path,
        Err(err) => return (Config::default(), Some(err.to_string())),
    };
    match Config::load_from(&path) {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(format!("{}: {err}", path.display()))),
    }
}

fn main() -> eframe::Result<()> {
    let cli = Cli::parse();
    let (mut config, config_error) = load_config(&cli);
    if let Some(url) = &cli.service_url {
        config.set_service_url(url);
    }
    if cli.no_sort {
        config.sort_files = false;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();
    if let Some(err) = config_error {
        log::warn!("using default settings, config not loaded: {err}");
    }

    if cli.write_config {
        let written = config_path(&cli).and_then(|path| {
            config.save_to(&path)?;
            Ok(path)
        });
        match written {
            Ok(path) => {
                log::info!("wrote {}", path.display());
                return Ok(());
            }
            Err(err) => {
                log::error!("cannot write config: {err}");
                std::process::exit(1);
            }
        }
    }

    let service = match HttpChartService::new(&config) {
        Ok(service) => Arc::new(service),
        Err(err) => {
            log::error!("cannot create HTTP client: {err}");
            std::process::exit(1);
        }
    };
    log::info!("chart service at {}", config.service_url);

    let title = "chart-annotate";
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title(title),
        ..Default::default()
    };

    let images = cli.images;
    eframe::run_native(
        title,
        options,
        Box::new(move |cc| {
            Ok(Box::new(ChartAnnotateApp::new(
                &cc.egui_ctx,
                config,
                service,
                images,
            )))
        }),
    )
}
