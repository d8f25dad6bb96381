//! Headless daemon: runs the engine on a timer and carries out its effects.

use std::io::Write;

use chrono::Utc;
use color_eyre::Result;

use crate::config::Config;
use crate::core::engine::{Effect, Engine, EngineState, SoundCue, TickOutcome};
use crate::core::store::{PersistenceStore, Preferences};
use crate::core::throttle::NotificationCategory;
use crate::event::{Event, EventHandler};
use crate::theme;

/// Where notifications and sounds end up.
pub trait Presenter {
    fn notify(&mut self, title: &str, message: &str, category: NotificationCategory);
    fn play_sound(&mut self, sound: &str);
    fn show_status(&mut self, line: &str);
}

/// Prints everything to stdout.
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn notify(&mut self, title: &str, message: &str, _category: NotificationCategory) {
        println!("[{}] {title}: {message}", Utc::now().format("%H:%M:%S"));
    }

    fn play_sound(&mut self, sound: &str) {
        log::debug!("Playing sound {sound}");
        print!("\x07");
        let _ = std::io::stdout().flush();
    }

    fn show_status(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Counts of what [`dispatch`] did, for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub shown: usize,
    pub muted: usize,
    pub sounds: usize,
    pub writes: usize,
    pub failed_writes: usize,
}

/// Applies engine effects, honouring the user's preferences.
///
/// Persistence failures are logged and left for the store to retry.
pub fn dispatch(
    effects: Vec<Effect>,
    store: &mut dyn PersistenceStore,
    presenter: &mut dyn Presenter,
) -> DispatchReport {
    let prefs = Preferences::load(&*store);
    let mut report = DispatchReport::default();

    for effect in effects {
        match effect {
            Effect::ShowNotification {
                title,
                message,
                category,
            } => {
                if prefs.notifications_enabled {
                    presenter.notify(&title, &message, category);
                    report.shown += 1;
                } else {
                    log::debug!("Notifications disabled, dropping {title}");
                    report.muted += 1;
                }
            }
            Effect::PlaySound(SoundCue::Disconnect) => {
                if prefs.sound_enabled() {
                    presenter.play_sound(&prefs.disconnect_sound);
                    report.sounds += 1;
                }
            }
            Effect::PersistenceWrite { key, value } => {
                let result = match value {
                    Some(value) => store.set(key, value),
                    None => store.remove(key),
                };
                report.writes += 1;
                if let Err(e) = result {
                    log::warn!("Failed to persist {key}: {e}");
                    report.failed_writes += 1;
                }
            }
        }
    }

    if let Err(e) = store.flush() {
        log::warn!("State not saved, will retry: {e}");
    }
    report
}

const COMMAND_HELP: &str =
    "commands: refresh | status | connect <name> | disconnect <name> | launch <name> | quit";

/// The running daemon.
pub struct App {
    engine: Engine,
    state: EngineState,
    store: Box<dyn PersistenceStore>,
    presenter: Box<dyn Presenter>,
    pub should_quit: bool,
}

impl App {
    #[must_use]
    pub fn new(
        engine: Engine,
        store: Box<dyn PersistenceStore>,
        presenter: Box<dyn Presenter>,
    ) -> Self {
        let state = EngineState::restore(store.as_ref());
        Self {
            engine,
            state,
            store,
            presenter,
            should_quit: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Runs one pipeline pass and applies its effects.
    pub fn on_tick(&mut self) -> DispatchReport {
        let state = std::mem::take(&mut self.state);
        let TickOutcome { state, effects, .. } = self.engine.tick(state, Utc::now());
        self.state = state;
        dispatch(effects, self.store.as_mut(), self.presenter.as_mut())
    }

    #[must_use]
    pub fn status_line(&self) -> String {
        let prefs = Preferences::load(self.store.as_ref());
        let address = if self.state.status.is_connected() {
            self.engine.collector().tunnel_address()
        } else {
            None
        };
        theme::status_line(
            &prefs,
            self.state.status,
            &self.state.session,
            (&self.state.usage.counters, self.state.usage.is_estimated()),
            address,
            Utc::now(),
        )
    }

    /// Handles one stdin command.
    pub fn handle_command(&mut self, line: &str) {
        let (verb, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(v, a)| (v, a.trim()));

        let now = Utc::now();
        let outcome = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("quit" | "exit", _) => {
                self.should_quit = true;
                return;
            }
            ("refresh", _) => {
                self.on_tick();
                self.print_status();
                return;
            }
            ("status", _) => {
                self.print_status();
                return;
            }
            ("connect", name) if !name.is_empty() => {
                self.engine.connect(&mut self.state, name, now)
            }
            ("disconnect", name) if !name.is_empty() => {
                self.engine.disconnect(&mut self.state, name, now)
            }
            ("launch", name) if !name.is_empty() => self.engine.launch(&mut self.state, name, now),
            _ => {
                println!("{COMMAND_HELP}");
                return;
            }
        };

        if let Err(e) = outcome.result {
            log::error!("{line}: {e}");
        }
        dispatch(outcome.effects, self.store.as_mut(), self.presenter.as_mut());
    }

    fn print_status(&mut self) {
        let line = self.status_line();
        self.presenter.show_status(&line);
    }

    /// Main loop: tick, then wait for the next tick or command.
    ///
    /// # Errors
    ///
    /// Returns an error only if the event channel closes.
    pub fn run(&mut self, config: &Config) -> Result<()> {
        let events = EventHandler::new(config.tick_interval()).with_stdin();
        log::info!("Watching VPN status every {:?}", config.tick_interval());

        self.on_tick();
        self.print_status();

        while !self.should_quit {
            match events.next()? {
                Event::Tick => {
                    let before = self.state.status;
                    self.on_tick();
                    events.drain_ticks();
                    if self.state.status != before {
                        self.print_status();
                    }
                }
                Event::Command(line) => self.handle_command(&line),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collector::SignalCollector;
    use crate::core::control::fake::RecordingControl;
    use crate::core::executor::{fake::FakeExecutor, CommandExecutor};
    use crate::core::probes::Platform;
    use crate::core::store::memory::MemoryStore;
    use crate::core::store::{StoreKey, StoreValue};
    use crate::core::usage::fake::{FixedInterfaceStats, FixedTraffic};
    use crate::core::usage::DataUsageTracker;
    use crate::state::VpnStatus;
    use chrono::TimeZone;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingPresenter {
        notes: Vec<String>,
        sounds: Vec<String>,
    }

    impl Presenter for RecordingPresenter {
        fn notify(&mut self, title: &str, _message: &str, _category: NotificationCategory) {
            self.notes.push(title.to_string());
        }

        fn play_sound(&mut self, sound: &str) {
            self.sounds.push(sound.to_string());
        }

        fn show_status(&mut self, _line: &str) {}
    }

    fn effects() -> Vec<Effect> {
        let t = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        vec![
            Effect::PersistenceWrite {
                key: StoreKey::ConnectionStartTime,
                value: None,
            },
            Effect::PersistenceWrite {
                key: StoreKey::LastNotificationTime,
                value: Some(StoreValue::Timestamp(t)),
            },
            Effect::ShowNotification {
                title: "VPN Disconnected".into(),
                message: "Connection lost".into(),
                category: NotificationCategory::Generic,
            },
            Effect::PlaySound(SoundCue::Disconnect),
        ]
    }

    #[test]
    fn test_dispatch_defaults() {
        let mut store = MemoryStore::new();
        let mut presenter = RecordingPresenter::default();
        let report = dispatch(effects(), &mut store, &mut presenter);
        assert_eq!(presenter.notes, vec!["VPN Disconnected"]);
        assert_eq!(presenter.sounds, vec!["Basso"]);
        assert_eq!(report.writes, 2);
        assert!(store.values.contains_key(&StoreKey::LastNotificationTime));
        assert_eq!(store.flushes, 1);
    }

    #[test]
    fn test_dispatch_respects_preferences() {
        let mut store = MemoryStore::new()
            .with(StoreKey::NotificationsEnabled, StoreValue::Bool(false))
            .with(StoreKey::DisconnectSound, StoreValue::Text("None".into()));
        let mut presenter = RecordingPresenter::default();
        let report = dispatch(effects(), &mut store, &mut presenter);
        assert!(presenter.notes.is_empty());
        assert!(presenter.sounds.is_empty());
        assert_eq!(report.muted, 1);
        // Writes still happen.
        assert_eq!(report.writes, 2);
    }

    #[test]
    fn test_dispatch_survives_write_failures() {
        let mut store = MemoryStore {
            fail_writes: true,
            ..MemoryStore::default()
        };
        let mut presenter = RecordingPresenter::default();
        let report = dispatch(effects(), &mut store, &mut presenter);
        assert_eq!(report.failed_writes, 2);
        assert_eq!(presenter.notes.len(), 1);
    }

    fn app(store: MemoryStore) -> App {
        let mut config = Config::default();
        config.corporate.pid_file = "/nonexistent/vpnwatch-app.pid".into();
        let exec: Rc<dyn CommandExecutor> = Rc::new(
            FakeExecutor::new()
                .with("scutil --nc list", "* (Connected)   Work VPN\n")
                .with("nmcli", "vpn:activated\n"),
        );
        let engine = Engine::from_parts(
            &config,
            SignalCollector::new(exec, Platform::current(), &config),
            DataUsageTracker::new(
                Box::new(FixedInterfaceStats::default()),
                Box::new(FixedTraffic::new(10, 20)),
            ),
            Box::new(RecordingControl::default()),
        );
        App::new(engine, Box::new(store), Box::<RecordingPresenter>::default())
    }

    #[test]
    fn test_on_tick_connects_and_persists() {
        let mut app = app(MemoryStore::new());
        let report = app.on_tick();
        assert_eq!(app.state().status, VpnStatus::Connected);
        assert_eq!(report.shown, 1);
        assert_eq!(report.failed_writes, 0);
        assert!(app.status_line().contains("Connected"));
    }

    #[test]
    fn test_commands() {
        let mut app = app(MemoryStore::new());
        app.handle_command("connect ClashX");
        app.handle_command("connect   ClashX ");
        assert_eq!(app.state().session.attempt_count, 2);
        app.handle_command("bogus");
        assert!(!app.should_quit);
        app.handle_command("QUIT");
        assert!(app.should_quit);
    }

    #[test]
    fn test_launch_command_is_announced_once_per_debounce() {
        let mut app = app(MemoryStore::new());
        app.handle_command("launch ClashX");
        let first = app.store.get(StoreKey::LastNotificationTime);
        assert!(first.is_some());
        assert!(app.state().notifications.last_notification.is_some());

        // Second request lands inside the window and is not shown.
        app.handle_command("launch ClashX");
        assert_eq!(app.store.get(StoreKey::LastNotificationTime), first);
    }

    #[test]
    fn test_resumes_persisted_session() {
        let start = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let store =
            MemoryStore::new().with(StoreKey::ConnectionStartTime, StoreValue::Timestamp(start));
        let mut app = app(store);
        assert_eq!(app.state().status, VpnStatus::Connected);
        let report = app.on_tick();
        assert_eq!(report.shown, 0);
        assert_eq!(app.state().session.start_time, Some(start));
    }
}
