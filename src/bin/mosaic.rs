use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::{bounded, select, tick};
use mosaic_sync::common::config::{self, Config};
use mosaic_sync::common::log;
use mosaic_sync::host::VirtualWindow;
use mosaic_sync::manager::WindowManager;
use mosaic_sync::model::geometry::Shape;
use mosaic_sync::store::file::FileStore;
use serde_json::json;
use tracing::{debug, info, warn};

/// Join a mesh of cooperating window processes. Run several instances to
/// watch them discover each other through the shared store.
#[derive(Parser)]
struct Cli {
    /// Path to the shared store file (overrides the configured path).
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Clear the shared store before joining.
    #[arg(long)]
    clear: bool,

    /// Initial window rectangle.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_shape,
          default_value = "100,100,800,600")]
    shape: Shape,

    /// Drift the window right and down by this many units per tick, to
    /// exercise shape-change propagation.
    #[arg(long, value_name = "UNITS")]
    drift: Option<f64>,

    /// Ticks per second for the update loop (overrides the config).
    #[arg(long)]
    fps: Option<f64>,

    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn parse_shape(raw: &str) -> Result<Shape, String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let &[x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected X,Y,W,H, got {raw:?}"));
    };
    let parse = |part: &str| part.parse::<f64>().map_err(|err| format!("{part:?}: {err}"));
    Ok(Shape::new(parse(x)?, parse(y)?, parse(w)?, parse(h)?))
}

fn main() -> anyhow::Result<()> {
    log::init();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config::config_file);
    let cfg = Config::load(&config_path);
    let store_path = cli.store.unwrap_or(cfg.settings.store_file);
    let fps = cli.fps.unwrap_or(cfg.settings.fps);

    if cli.clear {
        match std::fs::remove_file(&store_path) {
            Ok(()) => info!("cleared shared store at {store_path:?}"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!("could not clear {store_path:?}: {err}"),
        }
    }

    let store = FileStore::new(&store_path)
        .with_context(|| format!("opening shared store at {store_path:?}"))?;
    let window = VirtualWindow::new(cli.shape);
    let manager = WindowManager::init(
        Box::new(store),
        Box::new(window.clone()),
        json!({ "pid": std::process::id() }),
    );
    info!("joined mesh as window {} via {store_path:?}", manager.id());

    let registry_dirty = Arc::new(AtomicBool::new(true));
    let dirty = registry_dirty.clone();
    manager.set_on_registry_changed(move || {
        dirty.store(true, Ordering::SeqCst);
    });
    manager.set_on_shape_changed(|| {
        debug!("own geometry changed, registry persisted");
    });

    let (quit_tx, quit_rx) = bounded(1);
    ctrlc::set_handler(move || {
        let _ = quit_tx.send(());
    })
    .context("installing termination handler")?;

    let ticker = tick(Duration::from_secs_f64(1.0 / fps.max(1.0)));
    let mut alerted = false;
    loop {
        select! {
            recv(ticker) -> _ => {
                if let Some(step) = cli.drift {
                    window.shift(step, step);
                }
                let report = manager.update();
                if report.threshold_reached() {
                    if !alerted {
                        warn!("{} windows are nested inside other windows", report.count);
                        alerted = true;
                    }
                } else {
                    alerted = false;
                }
                if registry_dirty.swap(false, Ordering::SeqCst) {
                    // Re-fetched per frame; indices are never cached.
                    let ids: Vec<String> = manager
                        .windows()
                        .iter()
                        .map(|record| record.id.to_string())
                        .collect();
                    info!("window set changed: [{}]", ids.join(", "));
                }
            }
            recv(quit_rx) -> _ => break,
        }
    }

    manager.teardown();
    info!("left the mesh");
    Ok(())
}
