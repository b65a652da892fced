//! Chromium-backed sessions using chromiumoxide.
//!
//! Every session launches its own browser process with a private profile
//! directory, so partitions never share cookies, tabs or form state. Element
//! lookups are XPath evaluations run inside the page; the embedded report
//! frame is addressed through its `contentDocument`.

use super::{HeaderedRow, Locator, RemoteSession, SelectOption, SessionFactory};
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Delay between two checks of a polled wait.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

static PROFILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Browser executables looked up on `PATH`, in order of preference.
const SYSTEM_BROWSERS: [&str; 3] = ["google-chrome", "chromium", "chromium-browser"];

/// Locate a Chromium executable.
///
/// Candidates are tried in order: `explicit`, `OMMS_CHROMIUM_PATH`, a browser
/// unpacked under `~/.omms-harvest/chromium/`, the system browsers on `PATH`,
/// and finally the standard macOS application bundle.
pub fn find_chromium(explicit: Option<&str>) -> Option<PathBuf> {
    let configured = explicit
        .map(PathBuf::from)
        .into_iter()
        .chain(std::env::var_os("OMMS_CHROMIUM_PATH").map(PathBuf::from));
    let bundled = dirs::home_dir()
        .map(|home| bundled_candidates(&home.join(".omms-harvest").join("chromium")))
        .unwrap_or_default();

    configured
        .chain(bundled)
        .find(|p| p.is_file())
        .or_else(|| SYSTEM_BROWSERS.iter().find_map(|name| which::which(name).ok()))
        .or_else(|| {
            cfg!(target_os = "macos")
                .then(|| PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"))
                .filter(|p| p.is_file())
        })
}

/// Executable locations inside an unpacked Chrome-for-Testing archive.
fn bundled_candidates(root: &Path) -> Vec<PathBuf> {
    let platform = if cfg!(target_os = "macos") {
        root.join("Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing")
    } else {
        root.join("chrome-linux64").join("chrome")
    };
    vec![platform, root.join("chrome")]
}

/// Launch settings shared by every session of a run.
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub executable: PathBuf,
    pub headless: bool,
    pub page_load_timeout: Duration,
}

/// Launches one Chromium process per session.
pub struct ChromiumSessionFactory {
    options: ChromiumOptions,
}

impl ChromiumSessionFactory {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }

    /// Resolve the Chromium binary and build a factory.
    pub fn discover(
        explicit: Option<&str>,
        headless: bool,
        page_load_timeout: Duration,
    ) -> SessionResult<Self> {
        let executable = find_chromium(explicit).ok_or_else(|| {
            SessionError::Launch(
                "Chromium not found. Set OMMS_CHROMIUM_PATH or install google-chrome.".into(),
            )
        })?;
        Ok(Self::new(ChromiumOptions {
            executable,
            headless,
            page_load_timeout,
        }))
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open_session(&self) -> SessionResult<Box<dyn RemoteSession>> {
        let profile_dir = std::env::temp_dir().join(format!(
            "omms-harvest-{}-{}",
            std::process::id(),
            PROFILE_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let mut builder = BrowserConfig::builder()
            .chrome_executable(&self.options.executable)
            .user_data_dir(&profile_dir)
            .window_size(1920, 1080)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-notifications")
            .arg("--disable-popup-blocking")
            .arg("--disable-extensions");
        builder = if self.options.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let config = builder
            .build()
            .map_err(|e| SessionError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(format!("failed to launch Chromium: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                return Err(SessionError::Launch(format!("failed to create page: {e}")));
            }
        };

        debug!(profile = %profile_dir.display(), "chromium session launched");

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            profile_dir,
            frame: None,
            page_load_timeout: self.options.page_load_timeout,
        }))
    }
}

/// A single Chromium browser with one page.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    /// Frame the addressing context is currently inside, if any.
    frame: Option<Locator>,
    page_load_timeout: Duration,
}

/// Result of one in-page check script.
#[derive(Debug, Default, Deserialize)]
struct PageCheck {
    status: String,
    #[serde(default)]
    options: Vec<SelectOption>,
    #[serde(default)]
    header: Vec<String>,
    #[serde(default)]
    cells: Vec<String>,
}

impl ChromiumSession {
    async fn check(&self, script: &str) -> SessionResult<PageCheck> {
        let mut params = EvaluateParams::new(script);
        params.return_by_value = Some(true);
        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(evaluation_error)?;
        result
            .into_value::<PageCheck>()
            .map_err(|e| SessionError::Script(format!("unexpected check result: {e}")))
    }

    /// Run a check once and map its status to an error.
    async fn check_once(&self, what: &str, script: &str) -> SessionResult<PageCheck> {
        let check = self.check(script).await?;
        match check.status.as_str() {
            "ok" => Ok(check),
            "stale" => Err(SessionError::StaleElement(what.to_string())),
            "frame" => Err(SessionError::Frame(format!(
                "frame document unavailable while resolving {what}"
            ))),
            "no-option" => Err(SessionError::NotFound(format!("option for {what}"))),
            _ => Err(SessionError::NotFound(what.to_string())),
        }
    }

    /// Re-run a check until it reports `ok` or the timeout elapses.
    async fn poll(&self, what: &str, timeout: Duration, script: &str) -> SessionResult<PageCheck> {
        poll_until(what, timeout, self.frame.is_some(), move || self.check(script)).await
    }

    fn root(&self) -> String {
        root_expr(self.frame.as_ref())
    }
}

#[async_trait]
impl RemoteSession for ChromiumSession {
    async fn open(&mut self, url: &str) -> SessionResult<()> {
        self.frame = None;
        match tokio::time::timeout(self.page_load_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(load_failed(url, e, self.page_load_timeout)),
            Err(_) => Err(SessionError::timeout(
                format!("navigation to {url}"),
                self.page_load_timeout,
            )),
        }
    }

    async fn wait_until_page_ready(&mut self, timeout: Duration) -> SessionResult<()> {
        let script = format!(
            r#"(() => {{
                const root = {root};
                if (!root) return {{ status: "frame" }};
                return {{ status: root.readyState === "complete" ? "ok" : "loading" }};
            }})()"#,
            root = self.root()
        );
        self.poll("document ready", timeout, &script).await.map(|_| ())
    }

    async fn click_when_clickable(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> SessionResult<()> {
        let script = element_script(
            &self.root(),
            locator,
            r#"if (!isVisible(el) || el.disabled) return { status: "hidden" };
               el.click();
               return { status: "ok" };"#,
        );
        self.poll(locator.as_str(), timeout, &script).await.map(|_| ())
    }

    async fn wait_until_visible(&mut self, locator: &Locator, timeout: Duration) -> SessionResult<()> {
        let script = element_script(
            &self.root(),
            locator,
            r#"return { status: isVisible(el) ? "ok" : "hidden" };"#,
        );
        self.poll(locator.as_str(), timeout, &script).await.map(|_| ())
    }

    async fn select_option_by_label(&mut self, locator: &Locator, label: &str) -> SessionResult<()> {
        let body = format!(
            r#"const want = normalize({label});
               const opt = Array.from(el.options || []).find(o => normalize(o.text) === want);
               if (!opt) return {{ status: "no-option" }};
               el.value = opt.value;
               opt.selected = true;
               el.dispatchEvent(new Event("change", {{ bubbles: true }}));
               return {{ status: el.isConnected ? "ok" : "stale" }};"#,
            label = js_str(label)
        );
        let script = element_script(&self.root(), locator, &body);
        self.check_once(&format!("'{label}' in {locator}"), &script)
            .await
            .map(|_| ())
    }

    async fn select_option_by_value(&mut self, locator: &Locator, value: &str) -> SessionResult<()> {
        let body = format!(
            r#"const opt = Array.from(el.options || []).find(o => o.value === {value});
               if (!opt) return {{ status: "no-option" }};
               el.value = opt.value;
               opt.selected = true;
               el.dispatchEvent(new Event("change", {{ bubbles: true }}));
               return {{ status: el.isConnected ? "ok" : "stale" }};"#,
            value = js_str(value)
        );
        let script = element_script(&self.root(), locator, &body);
        self.check_once(&format!("value '{value}' in {locator}"), &script)
            .await
            .map(|_| ())
    }

    async fn read_options(&mut self, locator: &Locator) -> SessionResult<Vec<SelectOption>> {
        let script = element_script(
            &self.root(),
            locator,
            r#"return {
                 status: "ok",
                 options: Array.from(el.options || []).map(o => ({ value: o.value, label: normalize(o.text) })),
               };"#,
        );
        Ok(self.check_once(locator.as_str(), &script).await?.options)
    }

    async fn enter_frame(&mut self, locator: &Locator, timeout: Duration) -> SessionResult<()> {
        let script = element_script(
            "document",
            locator,
            r#"let doc = null;
               try { doc = el.contentDocument; } catch (e) { return { status: "frame" }; }
               return { status: doc && doc.readyState === "complete" ? "ok" : "loading" };"#,
        );
        self.poll(locator.as_str(), timeout, &script).await?;
        self.frame = Some(locator.clone());
        Ok(())
    }

    async fn exit_frame(&mut self) -> SessionResult<()> {
        self.frame = None;
        Ok(())
    }

    async fn read_row_after_header(
        &mut self,
        header_label: &str,
        timeout: Duration,
    ) -> SessionResult<HeaderedRow> {
        let label = xpath_literal(header_label);
        let script = format!(
            r#"(() => {{
                {helpers}
                const root = {root};
                if (!root) return {{ status: "frame" }};
                const table = first(root, {table}, root);
                if (!table || !isVisible(table)) return {{ status: "missing" }};
                const headerRow = first(root, {header_row}, table);
                if (!headerRow) return {{ status: "missing" }};
                const next = first(root, "following-sibling::tr[1]", headerRow);
                if (!next) return {{ status: "missing" }};
                return {{
                    status: "ok",
                    header: cellTexts(headerRow, "td, th"),
                    cells: cellTexts(next, "td"),
                }};
            }})()"#,
            helpers = JS_HELPERS,
            root = self.root(),
            table = js_str(&format!("//table[.//div[text()={label}]]")),
            header_row = js_str(&format!(".//tr[.//div[text()={label}]]")),
        );
        let check = self
            .poll(&format!("table with '{header_label}'"), timeout, &script)
            .await?;
        Ok(HeaderedRow {
            header: check.header,
            cells: check.cells,
        })
    }

    async fn close(self: Box<Self>) -> SessionResult<()> {
        let mut this = *self;
        let _ = this.page.close().await;
        if let Err(e) = this.browser.close().await {
            warn!("failed to close Chromium cleanly: {e}");
        }
        let _ = this.browser.wait().await;
        this.handler_task.abort();
        let _ = tokio::fs::remove_dir_all(&this.profile_dir).await;
        Ok(())
    }
}

/// Drive `check` until it reports `ok`.
///
/// Evaluation failures while the document is being replaced count as "not
/// ready yet". A closed browser, an unreadable check result, or a missing
/// frame document while addressing a frame end the wait at once.
async fn poll_until<F, Fut>(
    what: &str,
    timeout: Duration,
    in_frame: bool,
    mut check: F,
) -> SessionResult<PageCheck>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SessionResult<PageCheck>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match check().await {
            Ok(p) if p.status == "ok" => return Ok(p),
            Ok(p) if p.status == "frame" && in_frame => {
                return Err(SessionError::Frame(format!(
                    "frame document unavailable while waiting for {what}"
                )))
            }
            Ok(_) => {}
            Err(e) if e.is_transient() => debug!("{what}: {e}"),
            Err(e) => return Err(e),
        }
        if Instant::now() >= deadline {
            return Err(SessionError::timeout(what, timeout));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Map a failed `Runtime.evaluate` call.
///
/// A dead CDP channel means the browser is gone. Anything else happens while
/// the page navigates and the execution context is swapped out.
fn evaluation_error(e: CdpError) -> SessionError {
    match e {
        CdpError::ChannelSendError(_) => SessionError::Closed,
        other => SessionError::StaleElement(format!("document changed during evaluation: {other}")),
    }
}

/// A page load that did not complete; retried like any other wait.
fn load_failed(url: &str, cause: impl std::fmt::Display, after: Duration) -> SessionError {
    SessionError::timeout(format!("navigation to {url} ({cause})"), after)
}

/// Helper functions injected into every check script.
const JS_HELPERS: &str = r#"
    const first = (doc, xp, ctx) =>
        doc.evaluate(xp, ctx, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
    const normalize = s => (s || "").replace(/\s+/g, " ").trim();
    const isVisible = el => {
        const r = el.getBoundingClientRect();
        const view = el.ownerDocument.defaultView || window;
        const st = view.getComputedStyle(el);
        return r.width > 0 && r.height > 0 && st.visibility !== "hidden" && st.display !== "none";
    };
    const cellTexts = (row, sel) =>
        Array.from(row.querySelectorAll(sel)).map(c => normalize(c.innerText || c.textContent));
"#;

/// JS expression for the document lookups resolve against.
fn root_expr(frame: Option<&Locator>) -> String {
    match frame {
        None => "document".to_string(),
        Some(f) => format!(
            r#"(() => {{
                const f = document.evaluate({xp}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue;
                try {{ return f ? f.contentDocument : null; }} catch (e) {{ return null; }}
            }})()"#,
            xp = js_str(f.as_str())
        ),
    }
}

/// Wrap `body` so it runs with `el` bound to the element at `locator`.
fn element_script(root: &str, locator: &Locator, body: &str) -> String {
    format!(
        r#"(() => {{
            {helpers}
            const root = {root};
            if (!root) return {{ status: "frame" }};
            const el = first(root, {xp}, root);
            if (!el) return {{ status: "missing" }};
            {body}
        }})()"#,
        helpers = JS_HELPERS,
        xp = js_str(locator.as_str()),
    )
}

/// Encode a Rust string as a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Encode a string as an XPath 1.0 literal, splitting on double quotes.
fn xpath_literal(s: &str) -> String {
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    let parts: Vec<String> = s.split('"').map(|p| format!("\"{p}\"")).collect();
    format!("concat({})", parts.join(", '\"', "))
}
