pub const DEFAULT_USER_AGENT: &str = concat!("hls-proxy/", env!("CARGO_PKG_VERSION"));

#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum CargoEnv {
    Development,
    Production,
}

#[derive(clap::Parser, Debug)]
pub struct AppConfig {
    // production or development
    #[clap(long, env, value_enum, default_value = "development")]
    pub cargo_env: CargoEnv,

    // port that the app will bind to
    #[clap(long, env, default_value = "5000")]
    pub port: u16,

    // comma seperated list of upstream hostnames like cdn.example.com,media.example.org
    // leaving this empty lets the proxy fetch from ANY host
    #[clap(long, env, value_delimiter = ',')]
    pub allowed_hosts: Vec<String>,

    // shared secret that callers send as x-proxy-token or ?token=
    // leaving this empty turns the token check off
    #[clap(long, env)]
    pub auth_token: Option<String>,

    // pins the origin written into rewritten playlists, e.g. https://proxy.example.com
    // when unset it's built from x-forwarded-proto + host which can be spoofed
    #[clap(long, env)]
    pub public_base_url: Option<String>,

    // sent upstream when the caller doesn't send their own user agent
    #[clap(long, env, default_value = DEFAULT_USER_AGENT)]
    pub upstream_user_agent: String,

    #[clap(long, env, default_value = "10")]
    pub upstream_connect_timeout_secs: u64,

    #[clap(long, env, default_value = "10")]
    pub max_redirects: usize,

    // turns off the prometheus recorder and the /metrics route
    #[clap(long, env)]
    pub disable_metrics: bool,

    // optional sentry integration
    #[clap(long, env)]
    pub sentry_dsn: Option<String>,
}

impl AppConfig {
    /// allowed hosts with blanks dropped, `ALLOWED_HOSTS=""` means allow all
    pub fn allowed_hosts(&self) -> Vec<String> {
        self.allowed_hosts
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect()
    }

    /// an empty token is treated the same as no token
    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.clone().filter(|t| !t.is_empty())
    }

    pub fn public_base_url(&self) -> Option<String> {
        self.public_base_url
            .as_deref()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
    }
}

impl Default for AppConfig {
    // mostly for tests, this is the same as running with no env set
    fn default() -> Self {
        Self {
            cargo_env: CargoEnv::Development,
            port: 5000,
            allowed_hosts: Vec::new(),
            auth_token: None,
            public_base_url: None,
            upstream_user_agent: DEFAULT_USER_AGENT.to_string(),
            upstream_connect_timeout_secs: 10,
            max_redirects: 10,
            disable_metrics: false,
            sentry_dsn: None,
        }
    }
}
