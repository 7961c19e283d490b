use crawlflow_browser::{BrowserDriver, DEFAULT_USER_AGENT, LaunchOptions, PageHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::captcha::CaptchaSolver;
use crate::config::RunConfig;
use crate::context::{RunReport, SessionContext, new_run_id};
use crate::error::{EngineError, Result};
use crate::handlers::{self, StepScope};

const DEFAULT_SETTLE_DELAY_SECS: u64 = 2;
const DEFAULT_OUTPUT_ROOT: &str = "./tmp";
/// The entry navigation waits as long as the page needs.
const NO_TIMEOUT: Option<u64> = Some(0);

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub headless: bool,
    pub user_agent: String,
    /// Pause after a failed check item before the rollback is taken.
    pub settle_delay: Duration,
    /// Snapshot root when the document enables logging without `output_dir`.
    pub output_root: PathBuf,
    /// Parent of the per-run browser profile directories.
    pub profile_root: PathBuf,
    /// Overrides the document's `max_steps`.
    pub max_steps: Option<usize>,
    /// Used when the document carries no `solver_captcha` key.
    pub captcha_api_key: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            profile_root: std::env::temp_dir(),
            max_steps: None,
            captcha_api_key: None,
        }
    }
}

/// Walks a step graph against one browser session.
pub struct Engine {
    driver: Arc<dyn BrowserDriver>,
    solver: Arc<dyn CaptchaSolver>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        solver: Arc<dyn CaptchaSolver>,
        options: EngineOptions,
    ) -> Self {
        Self {
            driver,
            solver,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Execute one run. The page and popup are closed and browser cookies
    /// cleared on every exit path; on failure a best-effort snapshot is taken
    /// first and the error is returned unchanged.
    pub async fn run(&self, config: RunConfig) -> Result<RunReport> {
        let run_id = new_run_id();
        info!(run_id = %run_id, url = %config.url, headless = self.options.headless, "Starting run");

        for warning in config.validate() {
            warn!(run_id = %run_id, "{}", warning);
        }

        let output_dir = self.prepare_output_dir(&config, &run_id).await?;
        let launch = LaunchOptions {
            headless: self.options.headless,
            user_agent: self.options.user_agent.clone(),
            user_data_dir: self.options.profile_root.join(format!(
                "data_dir_{}_{}",
                run_id,
                Uuid::new_v4().simple()
            )),
            extension_paths: config.extension_paths(),
        };

        let page = match self.driver.launch(&launch).await {
            Ok(page) => page,
            Err(err) => {
                error!(run_id = %run_id, error = %err, "Browser launch failed");
                self.shutdown().await;
                return Err(err.into());
            }
        };
        debug!(run_id = %run_id, page = %page, profile = %launch.user_data_dir.display(), "Browser launched");

        let mut session = SessionContext::new(
            run_id,
            page,
            &config,
            output_dir,
            self.options.captcha_api_key.clone(),
        );
        let max_steps = self.options.max_steps.or(config.max_steps);

        let outcome = self.drive(&mut session, &config, max_steps).await;
        match outcome {
            Ok(()) => {
                self.close_session(&session).await;
                self.shutdown().await;
                info!(run_id = %session.run_id, steps = session.trace.len(), "Run finished");
                Ok(session.into_report())
            }
            Err(err) => {
                error!(run_id = %session.run_id, error = %err, "Run failed");
                self.fail_session(&session).await;
                self.shutdown().await;
                Err(err)
            }
        }
    }

    async fn prepare_output_dir(&self, config: &RunConfig, run_id: &str) -> Result<Option<PathBuf>> {
        if !config.log {
            return Ok(None);
        }

        let dir = config
            .output_dir
            .clone()
            .unwrap_or_else(|| self.options.output_root.join(run_id));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Some(dir))
    }

    async fn drive(
        &self,
        session: &mut SessionContext,
        config: &RunConfig,
        max_steps: Option<usize>,
    ) -> Result<()> {
        if config.block_images {
            self.driver
                .block_resource_types(&session.page, &["image".to_string()])
                .await?;
        }

        self.driver
            .goto(&session.page, &config.url, NO_TIMEOUT)
            .await?;
        self.store_cookies(session).await?;

        self.walk(session, max_steps).await
    }

    /// `Running(name)` until a step yields no successor.
    async fn walk(&self, session: &mut SessionContext, max_steps: Option<usize>) -> Result<()> {
        let mut current = Some(session.first_step.clone());
        let mut executed = 0usize;

        info!(first_step = ?current, "Walking step graph");
        while let Some(name) = current {
            if let Some(limit) = max_steps
                && executed >= limit
            {
                return Err(EngineError::StepLimitExceeded(limit));
            }

            current = self.execute_step(session, &name).await?;
            executed += 1;

            if let Some(next) = &current {
                info!(next_step = %next, "Next step");
            }
        }

        Ok(())
    }

    async fn execute_step(&self, session: &mut SessionContext, name: &str) -> Result<Option<String>> {
        let mut step = session
            .graph
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownStep(name.to_string()))?;
        session.trace.push(name.to_string());

        let page = session.target_page(name, step.in_popup)?;
        let scope = StepScope {
            driver: self.driver.as_ref(),
            solver: self.solver.as_ref(),
            page: page.clone(),
            step_name: name,
            step_id: step.id_label(),
            settle_delay: self.options.settle_delay,
        };
        debug!(step = %name, id = %scope.step_id, kind = step.kind(), page = %page, "Executing step");

        let redirect = if step.create_popup {
            self.driver.begin_popup_capture(&page).await?;
            let redirect = handlers::dispatch(&scope, session, &mut step).await?;
            let popup = self.driver.take_popup(&page).await?;
            info!(step = %name, popup = %popup, "Popup created");
            if let Some(previous) = session.promote_popup(popup) {
                debug!(previous = %previous, "Replaced tracked popup");
            }
            redirect
        } else {
            handlers::dispatch(&scope, session, &mut step).await?
        };

        let next = redirect.or_else(|| step.successor().map(str::to_string));
        // Check items spend their budget in the graph, so later visits see it.
        session.graph.insert(name, step);

        self.store_cookies(session).await?;
        self.snapshot(session, &page, name).await;

        info!(step = %name, next_step = ?next, "Step finished");
        Ok(next)
    }

    async fn store_cookies(&self, session: &mut SessionContext) -> Result<()> {
        let cookies = self.driver.cookies().await?;
        session.cookies.merge(cookies);
        Ok(())
    }

    /// Screenshot and HTML of `page` as `<label>.png` / `<label>.html`.
    async fn snapshot(&self, session: &SessionContext, page: &PageHandle, label: &str) {
        let Some(dir) = session.logging.snapshot_dir() else {
            debug!(label, "Snapshot skipped, logging disabled");
            return;
        };

        if let Err(err) = self.write_snapshot(dir, page, label).await {
            warn!(label, error = %err, "Snapshot failed");
        }
    }

    async fn write_snapshot(&self, dir: &Path, page: &PageHandle, label: &str) -> Result<()> {
        self.driver
            .screenshot(page, &dir.join(format!("{}.png", label)))
            .await?;
        let html = self.driver.content(page).await?;
        tokio::fs::write(dir.join(format!("{}.html", label)), html).await?;
        Ok(())
    }

    async fn close_session(&self, session: &SessionContext) {
        if let Some(popup) = &session.popup {
            info!(popup = %popup, "Closing popup");
            if let Err(err) = self.driver.close_page(popup).await {
                warn!(error = %err, "Closing popup failed");
            }
        }

        info!(page = %session.page, "Closing page");
        if let Err(err) = self.driver.close_page(&session.page).await {
            warn!(error = %err, "Closing page failed");
        }

        if let Err(err) = self.driver.clear_cookies().await {
            warn!(error = %err, "Clearing cookies failed");
        }
    }

    async fn fail_session(&self, session: &SessionContext) {
        let dir = session.logging.snapshot_dir();

        if let Some(popup) = &session.popup {
            if let Some(dir) = dir {
                let path = dir.join(format!("{}_popup_exception.png", session.run_id));
                if let Err(err) = self.driver.screenshot(popup, &path).await {
                    warn!(error = %err, "Popup failure screenshot failed");
                }
            }
            if let Err(err) = self.driver.close_page(popup).await {
                warn!(error = %err, "Closing popup failed");
            }
        }

        if let Some(dir) = dir {
            let path = dir.join(format!("{}_exception.png", session.run_id));
            if let Err(err) = self.driver.screenshot(&session.page, &path).await {
                warn!(error = %err, "Failure screenshot failed");
            }
            match self.driver.content(&session.page).await {
                Ok(html) => {
                    let path = dir.join(format!("{}_exception.html", session.run_id));
                    if let Err(err) = tokio::fs::write(&path, html).await {
                        warn!(error = %err, "Failure HTML snapshot failed");
                    }
                }
                Err(err) => warn!(error = %err, "Failure HTML capture failed"),
            }
        }

        if let Err(err) = self.driver.close_page(&session.page).await {
            warn!(error = %err, "Closing page failed");
        }

        if let Err(err) = self.driver.clear_cookies().await {
            warn!(error = %err, "Clearing cookies failed");
        }
    }

    async fn shutdown(&self) {
        if let Err(err) = self.driver.shutdown().await {
            warn!(error = %err, "Driver shutdown failed");
        }
    }
}
