//! W3C WebDriver client implementing the browser capability.
//!
//! Talks to an external chromedriver/geckodriver endpoint over its REST
//! protocol; the driver binary itself is not this crate's concern. One
//! [`WebDriverBrowser`] owns one driver session (one tab); the factory
//! opens additional sessions for tab-per-site mode.
//!
//! Error mapping follows the protocol envelope: every response carries a
//! `value` object which on failure holds `error` and `message` fields.
//! `"no such element"` becomes [`ScrapeError::NoSuchElement`]; other
//! driver failures keep their status so the retry layer can treat 5xx as
//! transient.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::browser::{BrowserFactory, BrowserPage};
use crate::error::ScrapeError;

/// W3C element-id key in find-element responses.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Poll interval for presence/readiness waits.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct WebDriverBrowser {
    http: reqwest::Client,
    base: String,
    session: String,
    page_load_wait: Duration,
    element_wait: Duration,
}

impl WebDriverBrowser {
    /// Opens a new driver session against `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Http`] if the endpoint is unreachable,
    /// [`ScrapeError::Driver`] if session creation is refused, or
    /// [`ScrapeError::Deserialize`] on a malformed protocol response.
    pub async fn connect(
        base_url: &str,
        page_load_wait: Duration,
        element_wait: Duration,
    ) -> Result<Self, ScrapeError> {
        let http = reqwest::Client::builder()
            .timeout(page_load_wait.max(Duration::from_secs(30)) + Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        let base = base_url.trim_end_matches('/').to_string();

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--headless=new", "--window-size=1920,1080"]
                    }
                }
            }
        });
        let value = raw_command(&http, &base, Method::POST, "/session", Some(&capabilities)).await?;
        let session = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| deserialize_error("session creation response", &value))?
            .to_string();

        let browser = Self {
            http,
            base,
            session,
            page_load_wait,
            element_wait,
        };

        #[allow(clippy::cast_possible_truncation)]
        let page_load_ms = page_load_wait.as_millis() as u64;
        browser
            .command(
                Method::POST,
                "/timeouts",
                Some(&json!({ "pageLoad": page_load_ms })),
            )
            .await?;

        Ok(browser)
    }

    /// Issues one session-scoped protocol command and unwraps the envelope.
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ScrapeError> {
        let path = format!("/session/{}{path}", self.session);
        raw_command(&self.http, &self.base, method, &path, body).await
    }

    async fn find_element(&self, selector: &str) -> Result<String, ScrapeError> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = match self.command(Method::POST, "/element", Some(&body)).await {
            Ok(value) => value,
            Err(ScrapeError::Driver { error, .. }) if error == "no such element" => {
                return Err(ScrapeError::NoSuchElement {
                    selector: selector.to_string(),
                })
            }
            Err(err) => return Err(err),
        };
        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| deserialize_error("find-element response", &value))
    }

    async fn execute_json(&self, script: &str) -> Result<Value, ScrapeError> {
        let body = json!({ "script": script, "args": [] });
        self.command(Method::POST, "/execute/sync", Some(&body))
            .await
    }
}

#[async_trait]
impl BrowserPage for WebDriverBrowser {
    async fn load_page(&self, url: &str) -> Result<(), ScrapeError> {
        self.command(Method::POST, "/url", Some(&json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn get_text(&self, selector: &str) -> Result<String, ScrapeError> {
        let element = self.find_element(selector).await?;
        let value = self
            .command(Method::GET, &format!("/element/{element}/text"), None)
            .await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| deserialize_error("element text response", &value))
    }

    async fn get_elements(&self, selector: &str) -> Result<Vec<String>, ScrapeError> {
        let body = json!({ "using": "css selector", "value": selector });
        let value = self.command(Method::POST, "/elements", Some(&body)).await?;
        let items = value
            .as_array()
            .ok_or_else(|| deserialize_error("find-elements response", &value))?;
        Ok(items
            .iter()
            .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
            .map(str::to_owned)
            .collect())
    }

    async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        let element = self.find_element(selector).await?;
        self.command(
            Method::POST,
            &format!("/element/{element}/click"),
            Some(&json!({})),
        )
        .await?;
        Ok(())
    }

    async fn send_keys(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        let element = self.find_element(selector).await?;
        self.command(
            Method::POST,
            &format!("/element/{element}/value"),
            Some(&json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn wait_until_present(&self, selector: &str) -> Result<(), ScrapeError> {
        let deadline = Instant::now() + self.element_wait;
        loop {
            match self.find_element(selector).await {
                Ok(_) => return Ok(()),
                Err(ScrapeError::NoSuchElement { .. }) => {
                    if Instant::now() >= deadline {
                        return Err(ScrapeError::WaitTimeout {
                            what: selector.to_string(),
                        });
                    }
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn wait_until_page_loaded(&self) -> Result<(), ScrapeError> {
        let deadline = Instant::now() + self.page_load_wait;
        loop {
            let state = self.execute_json("return document.readyState").await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::WaitTimeout {
                    what: "page load".to_string(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn current_url(&self) -> Result<String, ScrapeError> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| deserialize_error("current-url response", &value))
    }

    async fn page_html(&self) -> Result<String, ScrapeError> {
        let value = self.command(Method::GET, "/source", None).await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| deserialize_error("page-source response", &value))
    }

    async fn execute_script(&self, script: &str) -> Result<(), ScrapeError> {
        self.execute_json(script).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        let path = format!("/session/{}", self.session);
        raw_command(&self.http, &self.base, Method::DELETE, &path, None).await?;
        Ok(())
    }
}

/// Opens one WebDriver session per requested tab.
pub struct WebDriverFactory {
    base_url: String,
    page_load_wait: Duration,
    element_wait: Duration,
}

impl WebDriverFactory {
    #[must_use]
    pub fn new(base_url: &str, page_load_wait: Duration, element_wait: Duration) -> Self {
        Self {
            base_url: base_url.to_string(),
            page_load_wait,
            element_wait,
        }
    }
}

#[async_trait]
impl BrowserFactory for WebDriverFactory {
    async fn open_page(&self) -> Result<Arc<dyn BrowserPage>, ScrapeError> {
        let page =
            WebDriverBrowser::connect(&self.base_url, self.page_load_wait, self.element_wait)
                .await?;
        Ok(Arc::new(page))
    }
}

/// Sends one protocol request and unwraps the `value` envelope.
///
/// Non-2xx responses become [`ScrapeError::Driver`] carrying the protocol
/// error code and message so callers can distinguish selector misses from
/// driver-side failures.
async fn raw_command(
    http: &reqwest::Client,
    base: &str,
    method: Method,
    path: &str,
    body: Option<&Value>,
) -> Result<Value, ScrapeError> {
    let url = format!("{base}{path}");
    let mut request = http.request(method, &url);
    if let Some(body) = body {
        request = request.json(body);
    }

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    let parsed: Value = serde_json::from_str(&text).map_err(|e| ScrapeError::Deserialize {
        context: format!("webdriver response from {path}"),
        source: e,
    })?;
    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(ScrapeError::Driver {
            status: status.as_u16(),
            error,
            message,
        });
    }

    Ok(value)
}

fn deserialize_error(context: &str, value: &Value) -> ScrapeError {
    use serde::de::Error as _;
    ScrapeError::Deserialize {
        context: context.to_string(),
        source: serde_json::Error::custom(format!("unexpected payload shape: {value}")),
    }
}
