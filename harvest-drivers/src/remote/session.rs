use serde_json::json;
use ::webdriver::capabilities::Capabilities;

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// How to open a WebDriver session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// WebDriver endpoint; Chromedriver listens on 9515 by default.
    pub webdriver_url: String,
    pub headless: bool,
    /// Maximise the window after connecting (ignored when headless).
    pub maximize: bool,
    pub window_size: Option<(u32, u32)>,
    pub user_agent: Option<String>,
    /// Extra Chrome command-line arguments, appended verbatim.
    pub extra_args: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            maximize: true,
            window_size: None,
            user_agent: None,
            extra_args: Vec::new(),
        }
    }
}

impl SessionSettings {
    /// Chrome command-line arguments for these settings.
    pub fn chrome_arguments(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-dev-shm-usage".to_string(),
            "--no-sandbox".to_string(),
            "--disable-extensions".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }
        if let Some((width, height)) = self.window_size {
            args.push(format!("--window-size={width},{height}"));
        }
        if let Some(user_agent) = &self.user_agent {
            args.push(format!("--user-agent={user_agent}"));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// W3C capabilities carrying the Chrome options.
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": self.chrome_arguments() }),
        );
        caps
    }
}
