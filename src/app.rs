use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use glam::Vec2;
use instant::Instant;
use serde_json::Value;

use crate::command::{execute, HostInput, PageEvent, Response};
use crate::page::{LocalPage, Loader, PageChannel};
use crate::pet::animation::Registry;
use crate::pet::{PetRuntime, PointerButton};
use crate::relay::{BackgroundRequest, Relay, TabStatus};
use crate::render::headless::HeadlessSurface;
use crate::settings::file::JsonFileStore;
use crate::settings::{MemoryStore, SettingsStore};

/// Viewport when `WEBPET_VIEWPORT` is unset.
const DEFAULT_VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);
/// Longest wait for input when no timer is pending.
const IDLE_WAIT: Duration = Duration::from_secs(1);
/// How often to log message stats (seconds).
const STATS_LOG_INTERVAL: f64 = 30.0;
/// URL the headless page pretends to be.
const PAGE_URL: &str = "https://localhost/";

// ---------------------------------------------------------------------------
// Host stats
// ---------------------------------------------------------------------------

struct HostStats {
    last_log_time: Instant,
    commands: u64,
    events: u64,
    failures: u64,
    total: u64,
}

impl HostStats {
    fn new() -> Self {
        Self {
            last_log_time: Instant::now(),
            commands: 0,
            events: 0,
            failures: 0,
            total: 0,
        }
    }

    fn record(&mut self, input: &HostInput) {
        self.total += 1;
        match input {
            HostInput::Event(_) => self.events += 1,
            HostInput::Command(_) | HostInput::Shortcut(_) => self.commands += 1,
        }
    }

    fn maybe_log(&mut self, timers: usize) {
        let elapsed = self.last_log_time.elapsed().as_secs_f64();
        if elapsed < STATS_LOG_INTERVAL {
            return;
        }
        log::info!(
            "Messages: {} commands | {} events | {} failed | {} timers live | total: {}",
            self.commands,
            self.events,
            self.failures,
            timers,
            self.total,
        );
        self.last_log_time = Instant::now();
        self.commands = 0;
        self.events = 0;
        self.failures = 0;
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Host configuration from the environment.
#[derive(Debug, Clone, PartialEq)]
struct HostConfig {
    store_path: Option<PathBuf>,
    sprites: Option<PathBuf>,
    viewport: Vec2,
}

impl HostConfig {
    fn from_env() -> Result<Self, Box<dyn Error>> {
        let viewport = match std::env::var("WEBPET_VIEWPORT") {
            Ok(v) => parse_viewport(&v).ok_or(format!("WEBPET_VIEWPORT must be WxH, got {v:?}"))?,
            Err(_) => DEFAULT_VIEWPORT,
        };
        Ok(Self {
            store_path: std::env::var_os("WEBPET_STORE")
                .map(PathBuf::from)
                .or_else(JsonFileStore::default_path),
            sprites: std::env::var_os("WEBPET_SPRITES").map(PathBuf::from),
            viewport,
        })
    }

    fn open_store(&self) -> Rc<dyn SettingsStore> {
        match &self.store_path {
            Some(path) => {
                log::info!("Settings at {}", path.display());
                Rc::new(JsonFileStore::new(path.clone()))
            }
            None => {
                log::warn!("No data directory; settings will not survive a restart");
                Rc::new(MemoryStore::new())
            }
        }
    }

    fn load_registry(&self) -> Result<Registry, Box<dyn Error>> {
        match &self.sprites {
            Some(path) => {
                let registry = Registry::from_manifest_json(&std::fs::read_to_string(path)?)?;
                log::info!(
                    "Loaded {} animations from {}",
                    registry.names().count(),
                    path.display()
                );
                Ok(registry)
            }
            None => Ok(Registry::builtin()),
        }
    }
}

fn parse_viewport(s: &str) -> Option<Vec2> {
    let (w, h) = s.trim().split_once(['x', 'X'])?;
    let v = Vec2::new(w.trim().parse().ok()?, h.trim().parse().ok()?);
    (v.x > 0.0 && v.y > 0.0).then_some(v)
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// One page, its runtime and the background relay, fed from stdin.
struct Host {
    page: LocalPage<HeadlessSurface>,
    relay: Relay,
    stats: HostStats,
    start: Instant,
}

impl Host {
    fn new(config: &HostConfig) -> Result<Self, Box<dyn Error>> {
        let store = config.open_store();
        let registry = config.load_registry()?;
        let viewport = config.viewport;

        let loader_store = store.clone();
        let loader: Loader<HeadlessSurface> = Box::new(move || {
            PetRuntime::new(
                loader_store.clone(),
                HeadlessSurface::new(viewport.x, viewport.y),
                registry.clone(),
            )
        });

        let mut relay = Relay::new(store);
        let mut page = LocalPage::loaded(PAGE_URL, loader)?;
        relay.on_tab_updated(&mut page, TabStatus::Complete);

        Ok(Self {
            page,
            relay,
            stats: HostStats::new(),
            start: Instant::now(),
        })
    }

    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn advance(&mut self) {
        self.advance_to(self.now_ms());
    }

    fn advance_to(&mut self, now: u64) {
        if let Some(rt) = self.page.runtime_mut() {
            rt.advance_to(now);
            // nothing reads the call log here; only the resulting page state matters
            let drawn = rt.surface_mut().drain_ops();
            if !drawn.is_empty() {
                log::trace!("{} surface ops", drawn.len());
            }
        }
        self.relay.pump();
    }

    /// How long the loop may block before a timer needs firing.
    fn wait_budget(&self) -> Duration {
        let now = self.now_ms();
        self.page
            .runtime()
            .and_then(|rt| rt.next_deadline())
            .map(|due| Duration::from_millis(due.saturating_sub(now)))
            .unwrap_or(IDLE_WAIT)
            .min(IDLE_WAIT)
    }

    /// Handle one input line. Returns the reply to print, if any.
    fn handle_line(&mut self, line: &str) -> Option<Value> {
        let input = match HostInput::parse(line) {
            Ok(input) => input,
            Err(e) => {
                log::warn!("Ignoring input: {e}");
                self.stats.failures += 1;
                return None;
            }
        };
        self.stats.record(&input);

        match input {
            HostInput::Command(msg) if BackgroundRequest::matches(&msg) => {
                Some(self.relay.handle_request(&msg))
            }
            HostInput::Command(msg) => {
                let reply = match self.page.runtime_mut() {
                    Some(rt) => execute(rt, &msg),
                    None => Response::failure(format!("page unreachable: {}", self.page.url())),
                };
                if !reply.success {
                    self.stats.failures += 1;
                }
                serde_json::to_value(reply).ok()
            }
            HostInput::Shortcut(name) => {
                self.relay.on_shortcut(&name, Some(&mut self.page));
                None
            }
            HostInput::Event(event) => {
                apply_event(&mut self.page, event);
                None
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(rt) = self.page.runtime_mut() {
            rt.unload();
        }
        self.relay.pump();
    }
}

fn apply_event(page: &mut LocalPage<HeadlessSurface>, event: PageEvent) {
    let Some(rt) = page.runtime_mut() else {
        return;
    };
    match event {
        PageEvent::PointerDown { x, y, button } => {
            rt.pointer_down(Vec2::new(x, y), PointerButton::from_index(button))
        }
        PageEvent::PointerMove { x, y } => rt.pointer_move(Vec2::new(x, y)),
        PageEvent::PointerUp { x, y } => rt.pointer_up(Vec2::new(x, y)),
        PageEvent::PointerEnter => rt.pointer_enter(),
        PageEvent::PointerLeave => rt.pointer_leave(),
        PageEvent::ContextMenu { x, y } => rt.context_menu(Vec2::new(x, y)),
        PageEvent::MenuSelect { item } => {
            if let Err(e) = rt.select_menu_item(item) {
                log::warn!("Menu action failed: {e}");
            }
        }
        PageEvent::MenuDismiss => rt.dismiss_menu(),
        PageEvent::Resize { width, height } => {
            rt.surface_mut().resize(width, height);
            rt.viewport_changed();
        }
        PageEvent::Unload => rt.unload(),
    }
}

/// Entry point: read line-delimited JSON from stdin until EOF.
pub fn run() -> Result<(), Box<dyn Error>> {
    let config = HostConfig::from_env()?;
    let mut host = Host::new(&config)?;
    log::info!(
        "Host ready: viewport {}x{}",
        config.viewport.x,
        config.viewport.y
    );

    let (tx, rx) = mpsc::channel::<String>();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("stdin: {e}");
                    break;
                }
            }
        }
    });

    let stdout = io::stdout();
    loop {
        host.advance();
        match rx.recv_timeout(host.wait_budget()) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                host.advance();
                if let Some(reply) = host.handle_line(&line) {
                    let mut out = stdout.lock();
                    writeln!(out, "{reply}")?;
                    out.flush()?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::info!("Input closed, exiting");
                break;
            }
        }
        let timers = host
            .page
            .runtime()
            .map_or(0, |rt| rt.active_timer_count());
        host.stats.maybe_log(timers);
    }

    host.shutdown();
    Ok(())
}
