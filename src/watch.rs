// ABOUTME: Serve module for previewing the generated site
// ABOUTME: Serves the output over HTTP and rebuilds it whenever the input or configuration changes

use log::{debug, error, info, warn};
use parking_lot::RwLock;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult};
use percent_encoding::percent_decode_str;
use tiny_http::{Header, Request, Response, Server, StatusCode};

use crate::config::{find_config_file, Config};
use crate::errors::{Result, SlidesError};
use crate::resources::BundledAssets;
use crate::site::{build_site, SiteConfig};
use crate::utils;

/// Default address of the preview server
pub const DEFAULT_DEV_ADDRESS: &str = "localhost:8000";

/// Configuration for serve mode
pub struct ServeConfig {
    /// The build to run on every change; its output directory is served
    pub site: SiteConfig,

    /// Address the HTTP server binds to, e.g. `localhost:8000`
    pub address: String,

    /// Debounce time in milliseconds
    pub debounce_ms: u64,

    /// Also rebuild when themes, favicons or templates named in the config file change
    pub watch_config_assets: bool,

    /// Open the served site in the default browser after the first build
    pub open_browser: bool,
}

impl ServeConfig {
    pub fn new(site: SiteConfig) -> Self {
        Self {
            site,
            address: DEFAULT_DEV_ADDRESS.to_string(),
            debounce_ms: 500,
            watch_config_assets: true,
            open_browser: false,
        }
    }
}

/// Guards the output directory; the server reads while no build is writing
type OutputLock = Arc<RwLock<()>>;

/// What the watch loop reacts to
enum ServeEvent {
    Changes(DebounceEventResult),
    Shutdown,
}

/// Build once, then serve the output and rebuild on changes until Ctrl+C.
///
/// Returns normally on Ctrl+C so the caller can clean up the output directory.
pub fn serve(config: ServeConfig) -> Result<()> {
    let (tx, rx) = mpsc::channel();

    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(ServeEvent::Shutdown);
    })
    .map_err(|e| SlidesError::WatchError(format!("Failed to install Ctrl+C handler: {}", e)))?;

    let lock: OutputLock = Arc::new(RwLock::new(()));

    rebuild(&config.site, &lock);

    let output_root = utils::absolute_path(&config.site.output_path)?;
    start_server(output_root, &config.address, lock.clone())?;

    if config.open_browser {
        let url = format!("http://{}/", config.address);
        if let Err(e) = open::that(&url) {
            warn!("Failed to open {} in a browser: {}", url, e);
        }
    }

    let watched = watched_paths(&config)?;

    let mut debouncer = new_debouncer(
        Duration::from_millis(config.debounce_ms),
        None,
        move |result: DebounceEventResult| {
            let _ = tx.send(ServeEvent::Changes(result));
        },
    )
    .map_err(|e| SlidesError::WatchError(format!("Failed to create file watcher: {}", e)))?;

    for (path, mode) in &watched {
        debouncer.watcher().watch(path, *mode).map_err(|e| {
            SlidesError::WatchError(format!("Failed to start watching {:?}: {}", path, e))
        })?;
        debug!("Watching {:?} ({:?})", path, mode);
    }

    info!("Watching {} paths for changes", watched.len());
    println!("Watching for changes (Press Ctrl+C to stop)");

    let mut last_processed = Instant::now();

    for event in rx {
        match event {
            ServeEvent::Shutdown => {
                info!("Stopping server");
                break;
            }
            ServeEvent::Changes(Ok(events)) => {
                let relevant_changes = events.iter().any(|event| {
                    event.paths.iter().any(|path| {
                        let is_relevant = is_relevant_path(path, &watched);
                        if is_relevant {
                            debug!("Detected relevant change in {:?}", path);
                        }
                        is_relevant
                    })
                });

                let now = Instant::now();
                if relevant_changes
                    && now.duration_since(last_processed) > Duration::from_millis(config.debounce_ms)
                {
                    rebuild(&config.site, &lock);
                    last_processed = Instant::now();
                }
            }
            ServeEvent::Changes(Err(errors)) => error!("Watch error: {:?}", errors),
        }
    }

    Ok(())
}

/// Full rebuild under the write lock; failures are logged and the server keeps running.
fn rebuild(site: &SiteConfig, lock: &OutputLock) {
    let _guard = lock.write();
    info!("Rebuilding site...");
    match build_site(site) {
        Ok(report) => info!("Rebuilt {} slideshows", report.pages.len()),
        Err(e) => error!("Failed to build site: {}", e),
    }
}

/// Input, config file and the local assets the config file refers to.
fn watched_paths(config: &ServeConfig) -> Result<Vec<(PathBuf, RecursiveMode)>> {
    let site = &config.site;
    let input = utils::absolute_path(&site.input_path)?;

    let mut watched = vec![if input.is_dir() {
        (input, RecursiveMode::Recursive)
    } else {
        (input, RecursiveMode::NonRecursive)
    }];

    let config_path = find_config_file(site.config_path.as_deref());
    if let Some(config_path) = config_path.filter(|path| path.is_file()) {
        let config_path = utils::absolute_path(&config_path)?;

        if config.watch_config_assets {
            let config_dir = config_path.parent().unwrap_or(Path::new("/"));
            match Config::load(Some(&config_path)) {
                Ok(global) => {
                    let bundle = BundledAssets::discover(&site.assets_dir)?;
                    for asset in global.local_asset_paths(config_dir, &bundle) {
                        watched.push((utils::absolute_path(&asset)?, RecursiveMode::NonRecursive));
                    }
                }
                Err(e) => warn!("Not watching config assets: {}", e),
            }
        }

        watched.push((config_path, RecursiveMode::NonRecursive));
    }

    Ok(watched)
}

/// Whether a changed path lies within one of the watched paths
fn is_relevant_path(path: &Path, watched: &[(PathBuf, RecursiveMode)]) -> bool {
    let path = match utils::absolute_path(path) {
        Ok(p) => p,
        Err(_) => return false,
    };
    watched.iter().any(|(watched_path, mode)| match mode {
        RecursiveMode::Recursive => path.starts_with(watched_path),
        RecursiveMode::NonRecursive => &path == watched_path,
    })
}

/// Start a simple HTTP server for the output directory
fn start_server(root: PathBuf, address: &str, lock: OutputLock) -> Result<()> {
    let server = Server::http(address)
        .map_err(|e| SlidesError::WatchError(format!("Failed to start HTTP server: {}", e)))?;

    info!("Serving {:?} on http://{}", root, address);
    println!("Serving on http://{}", address);

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let _guard = lock.read();
            respond(request, &root);
        }
    });

    Ok(())
}

fn respond(request: Request, root: &Path) {
    let url_path = request.url().to_string();
    let Some(file_path) = map_url_to_file(&url_path, root) else {
        debug!("Request for {:?} not found", url_path);
        let response = Response::from_string("404 Not Found").with_status_code(StatusCode(404));
        let _ = request.respond(response);
        return;
    };

    debug!("Request for {:?} -> {:?}", url_path, file_path);

    match fs::read(&file_path) {
        Ok(content) => {
            let mut response = Response::from_data(content);
            if let Ok(header) = Header::from_bytes("Content-Type", content_type(&file_path)) {
                response = response.with_header(header);
            }
            if let Err(e) = request.respond(response) {
                error!("Failed to send response: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to read file {:?}: {}", file_path, e);
            let response = Response::from_string(format!("Failed to read file: {}", e))
                .with_status_code(StatusCode(500));
            let _ = request.respond(response);
        }
    }
}

/// Map a request URL to a file inside `root`, serving `index.html` for directories.
pub fn map_url_to_file(url_path: &str, root: &Path) -> Option<PathBuf> {
    let path = url_path.split(['?', '#']).next().unwrap_or_default();
    let decoded = percent_decode_str(path).decode_utf8().ok()?;
    let relative = utils::normalize_path(Path::new(decoded.trim_start_matches('/')));
    if relative.starts_with("..") {
        return None;
    }

    let mut file_path = root.join(relative);
    if file_path.is_dir() {
        file_path = file_path.join("index.html");
    }
    file_path.is_file().then_some(file_path)
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" => "application/json",
        "md" => "text/markdown; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}
