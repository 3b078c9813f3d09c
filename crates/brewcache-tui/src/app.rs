//! Application state management for brewcache.
//!
//! This module contains the core `App` struct: the calculator and brew
//! state, the offline cache registration, and background task coordination.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use brewcache_core::cache::{
    ActivationReport, ClickOutcome, ClientId, Notification, RegisterOutcome, RegistrationStatus,
};
use brewcache_core::github::{self, STAR_PLACEHOLDER};
use brewcache_core::{
    recipe_table, BrewSession, Config, ControlMessage, FileStorage, HttpFetcher, RatioControl,
    RecipeRow, Registration,
};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Number of table rows to jump on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

/// Subdirectory of the cache dir holding generation buckets.
const GENERATIONS_DIR: &str = "generations";

pub type AppRegistration = Registration<FileStorage, HttpFetcher>;

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Recipe,
    Brew,
    Cache,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Recipe, Tab::Brew, Tab::Cache];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Recipe => "Recipe",
            Tab::Brew => "Brew",
            Tab::Cache => "Cache",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Recipe => Tab::Brew,
            Tab::Brew => Tab::Cache,
            Tab::Cache => Tab::Recipe,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Tab::Recipe => Tab::Cache,
            Tab::Brew => Tab::Recipe,
            Tab::Cache => Tab::Brew,
        }
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from background tasks over the MPSC channel.
enum TaskResult {
    Registered(RegisterOutcome),
    Activated(Option<ActivationReport>),
    Status(RegistrationStatus),
    Stars(u64),
    Notified(Notification),
    Clicked(ClickOutcome),
    Error(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    pub config: Config,
    pub registration: Arc<AppRegistration>,
    /// This terminal session as a client of the registration.
    pub client_id: Option<ClientId>,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub ratio: RatioControl,
    pub table: Vec<RecipeRow>,
    pub table_selection: usize,
    pub session: BrewSession,
    pub step_selection: usize,

    // Footer and cache tab data
    pub star_text: String,
    pub cache_status: Option<RegistrationStatus>,
    pub notification: Option<Notification>,
    pub update_pending: bool,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,

    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance
    pub async fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");

        let registration = build_registration(&config, &cache_dir)?;
        let mut app = Self::from_parts(config, Arc::new(registration));

        // Serve the generation from the last run before anything is fetched
        match app.registration.restore(&app.config.cache).await {
            Ok(Some(name)) => info!(cache = %name, "Offline cache restored"),
            Ok(None) => debug!("No offline cache from an earlier run"),
            Err(e) => warn!(error = %e, "Failed to restore offline cache"),
        }

        let scope = app.registration.scope().clone();
        let client = app.registration.open_client(&scope).await;
        app.client_id = Some(client.id);

        Ok(app)
    }

    pub fn from_parts(config: Config, registration: Arc<AppRegistration>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let ratio = match config.last_ratio {
            Some(raw) => RatioControl::with_value(config.recipe.clone(), raw),
            None => RatioControl::new(config.recipe.clone()),
        };
        let table = recipe_table(ratio.raw(), &config.recipe);
        let start_water = config.last_water.unwrap_or(config.recipe.highlight_water);
        let table_selection = table
            .iter()
            .position(|row| row.recipe.water == start_water)
            .unwrap_or(0);

        Self {
            config,
            registration,
            client_id: None,
            state: AppState::Normal,
            current_tab: Tab::Recipe,
            ratio,
            table,
            table_selection,
            session: BrewSession::new(),
            step_selection: 0,
            star_text: STAR_PLACEHOLDER.to_string(),
            cache_status: None,
            notification: None,
            update_pending: false,
            task_rx: rx,
            task_tx: tx,
            status_message: None,
        }
    }

    // ===== Background tasks =====

    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if let Err(e) = tx.send(result).await {
            warn!(error = %e, "Failed to send background result");
        }
    }

    /// Install the configured generation, then report cache status and the
    /// repository star count.
    pub fn start_background(&mut self) {
        let tx = self.task_tx.clone();
        let registration = Arc::clone(&self.registration);
        let cache_config = self.config.cache.clone();
        let repo = self.config.github_repo.clone();

        tokio::spawn(async move {
            match registration.register(&cache_config).await {
                Ok(outcome) => Self::send_result(&tx, TaskResult::Registered(outcome)).await,
                Err(e) => {
                    Self::send_result(&tx, TaskResult::Error(format!("Install failed: {}", e)))
                        .await
                }
            }
            Self::send_status(&tx, &registration).await;

            match github::fetch_star_count(&registration, &repo).await {
                Ok(count) => Self::send_result(&tx, TaskResult::Stars(count)).await,
                // Keep the placeholder
                Err(e) => debug!(error = %e, "Star count unavailable"),
            }
        });

        self.status_message = Some("Preparing offline cache...".to_string());
    }

    async fn send_status(tx: &mpsc::Sender<TaskResult>, registration: &AppRegistration) {
        match registration.snapshot().await {
            Ok(status) => Self::send_result(tx, TaskResult::Status(status)).await,
            Err(e) => {
                Self::send_result(tx, TaskResult::Error(format!("Cache status: {}", e))).await
            }
        }
    }

    pub fn refresh_cache_status(&mut self) {
        let tx = self.task_tx.clone();
        let registration = Arc::clone(&self.registration);
        tokio::spawn(async move {
            Self::send_status(&tx, &registration).await;
        });
    }

    /// Tell the waiting generation to take over now.
    pub fn activate_update(&mut self) {
        if !self.update_pending {
            self.status_message = Some("No update waiting".to_string());
            return;
        }
        let tx = self.task_tx.clone();
        let registration = Arc::clone(&self.registration);
        tokio::spawn(async move {
            match registration.post_message(ControlMessage::SkipWaiting).await {
                Ok(report) => Self::send_result(&tx, TaskResult::Activated(report)).await,
                Err(e) => {
                    Self::send_result(&tx, TaskResult::Error(format!("Activation failed: {}", e)))
                        .await
                }
            }
            Self::send_status(&tx, &registration).await;
        });
        self.status_message = Some("Activating update...".to_string());
    }

    /// Drain pending results from background tasks.
    pub async fn check_background_tasks(&mut self) {
        let mut results = Vec::new();
        while let Ok(result) = self.task_rx.try_recv() {
            results.push(result);
        }

        for result in results {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Registered(outcome) => {
                self.status_message = Some(match outcome {
                    RegisterOutcome::Unchanged => "Offline cache up to date".to_string(),
                    RegisterOutcome::Waiting => {
                        self.update_pending = true;
                        "Update ready, press [a] on the Cache tab to activate".to_string()
                    }
                    RegisterOutcome::Activated(report) => {
                        format!("Offline cache ready ({})", report.cache_name)
                    }
                });
            }
            TaskResult::Activated(Some(report)) => {
                self.update_pending = false;
                info!(cache = %report.cache_name, evicted = report.evicted.len(), "Update activated");
                self.status_message = Some(format!("Now serving {}", report.cache_name));
            }
            TaskResult::Activated(None) => {
                self.update_pending = false;
                self.status_message = Some("No update waiting".to_string());
            }
            TaskResult::Status(status) => {
                self.update_pending = status.waiting.is_some();
                self.cache_status = Some(status);
            }
            TaskResult::Stars(count) => {
                self.star_text = github::format_star_count(count);
            }
            TaskResult::Notified(notification) => {
                self.notification = Some(notification);
            }
            TaskResult::Clicked(outcome) => {
                self.notification = None;
                self.status_message = Some(match outcome {
                    ClickOutcome::Focused(id) if Some(id) == self.client_id => {
                        "Back to your brew".to_string()
                    }
                    ClickOutcome::Focused(id) => format!("Focused window {}", id),
                    ClickOutcome::Opened(id) => format!("Opened window {}", id),
                });
            }
            TaskResult::Error(msg) => {
                warn!(error = %msg, "Background task error");
                self.status_message = Some(msg);
            }
        }
    }

    // ===== Recipe tab =====

    fn rebuild_table(&mut self) {
        self.table = recipe_table(self.ratio.raw(), &self.config.recipe);
    }

    pub fn ratio_up(&mut self) {
        self.ratio.step_up();
        self.rebuild_table();
    }

    pub fn ratio_down(&mut self) {
        self.ratio.step_down();
        self.rebuild_table();
    }

    pub fn reset_ratio(&mut self) {
        self.ratio.reset();
        self.rebuild_table();
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.table.is_empty() {
            return;
        }
        let last = self.table.len() - 1;
        self.table_selection = self.table_selection.saturating_add_signed(delta).min(last);
    }

    pub fn selected_row(&self) -> Option<&RecipeRow> {
        self.table.get(self.table_selection)
    }

    /// Start a brew with the highlighted table row.
    pub fn select_recipe(&mut self) {
        let Some(row) = self.selected_row().copied() else {
            return;
        };
        self.session.select(row.recipe);
        self.step_selection = 0;
        self.current_tab = Tab::Brew;
        self.status_message = Some(row.recipe.label());
    }

    // ===== Brew tab =====

    pub fn move_step(&mut self, delta: isize) {
        self.step_selection = self.step_selection.saturating_add_signed(delta).min(3);
    }

    /// Advance the highlighted step. Completing the last one raises a
    /// notification.
    pub fn click_step(&mut self) {
        let was_complete = self.session.is_complete();
        if !self.session.click(self.step_selection) {
            return;
        }

        // Follow the brew to the step that is now available
        if let Some(next) = self
            .session
            .states()
            .iter()
            .position(|s| *s == brewcache_core::StepState::Available)
        {
            self.step_selection = next;
        }

        if self.session.is_complete() && !was_complete {
            let body = self.session.label().unwrap_or_default();
            self.notify("Brew complete", body);
        }
    }

    pub fn reset_brew(&mut self) {
        self.session.reset();
        self.step_selection = 0;
    }

    fn notify(&mut self, title: &'static str, body: String) {
        let tx = self.task_tx.clone();
        let registration = Arc::clone(&self.registration);
        tokio::spawn(async move {
            let notification = registration.show_notification(title, &body).await;
            Self::send_result(&tx, TaskResult::Notified(notification)).await;
        });
    }

    pub fn click_notification(&mut self) {
        let Some(notification) = self.notification.clone() else {
            return;
        };
        let tx = self.task_tx.clone();
        let registration = Arc::clone(&self.registration);
        tokio::spawn(async move {
            let outcome = registration.notification_click(notification.id).await;
            Self::send_result(&tx, TaskResult::Clicked(outcome)).await;
        });
    }

    pub fn dismiss_notification(&mut self) {
        let Some(notification) = self.notification.take() else {
            return;
        };
        let registration = Arc::clone(&self.registration);
        tokio::spawn(async move {
            registration.notification_close(notification.id).await;
        });
    }

    // ===== Persistence =====

    pub fn save_preferences(&mut self) {
        self.config.last_ratio = Some(self.ratio.raw());
        self.config.last_water = self.selected_row().map(|row| row.recipe.water);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }
}

/// Registration backed by the on-disk bucket store and the HTTP client.
pub fn build_registration(config: &Config, cache_dir: &Path) -> Result<AppRegistration> {
    let storage = FileStorage::new(cache_dir.join(GENERATIONS_DIR))
        .context("Failed to open cache directory")?;
    let fetcher = HttpFetcher::new(config.cache.request_timeout())
        .context("Failed to create HTTP client")?;
    Registration::new(storage, fetcher, &config.cache).context("Invalid cache configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use brewcache_core::StepState;

    fn test_app(dir: &Path) -> App {
        let config = Config::default();
        let registration = build_registration(&config, dir).unwrap();
        App::from_parts(config, Arc::new(registration))
    }

    // -------------------------------------------------------------------------
    // Tab Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_tab_next() {
        assert_eq!(Tab::Recipe.next(), Tab::Brew);
        assert_eq!(Tab::Brew.next(), Tab::Cache);
        assert_eq!(Tab::Cache.next(), Tab::Recipe);
    }

    #[test]
    fn test_tab_prev() {
        assert_eq!(Tab::Recipe.prev(), Tab::Cache);
        assert_eq!(Tab::Brew.prev(), Tab::Recipe);
        assert_eq!(Tab::Cache.prev(), Tab::Brew);
    }

    #[test]
    fn test_tab_roundtrip() {
        for tab in Tab::ALL {
            assert_eq!(tab.next().prev(), tab);
        }
    }

    // -------------------------------------------------------------------------
    // App Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_initial_selection_is_highlighted_row() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        assert_eq!(app.table.len(), 41);
        let row = app.selected_row().unwrap();
        assert_eq!(row.recipe.water, 250);
        assert!(row.highlighted);
        assert_eq!(app.star_text, "Star on GitHub");
    }

    #[test]
    fn test_ratio_changes_rebuild_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        let before = app.selected_row().unwrap().recipe.coffee;

        for _ in 0..10 {
            app.ratio_down();
        }
        assert_eq!(app.ratio.display(), "1:15.7");
        assert!(app.selected_row().unwrap().recipe.coffee > before);

        app.reset_ratio();
        assert_eq!(app.selected_row().unwrap().recipe.coffee, before);
    }

    #[test]
    fn test_move_selection_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.move_selection(-1000);
        assert_eq!(app.table_selection, 0);
        app.move_selection(1000);
        assert_eq!(app.table_selection, 40);
    }

    #[test]
    fn test_select_recipe_opens_brew_tab() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.select_recipe();

        assert_eq!(app.current_tab, Tab::Brew);
        assert!(app.session.panel_visible());
        assert_eq!(app.session.state(0), Some(StepState::Available));
    }

    #[tokio::test]
    async fn test_completing_brew_raises_notification() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.select_recipe();

        for _ in 0..8 {
            app.click_step();
        }
        assert!(app.session.is_complete());
        assert_eq!(app.step_selection, 3);

        // Let the spawned notification task run
        let mut open = Vec::new();
        for _ in 0..100 {
            open = app.registration.notifications().open().await;
            if !open.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "Brew complete");
    }

    #[test]
    fn test_activate_without_update() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        app.activate_update();
        assert_eq!(app.status_message.as_deref(), Some("No update waiting"));
    }
}
