use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Public base URL of this service.
    pub base_url: String,
    /// Public site URL used for default checkout redirects.
    pub site_url: String,
    /// Identity provider session endpoint proxied by /refresh-token.
    pub session_endpoint: String,
    pub stripe_secret_key: String,
    /// Overridable for wire-level test doubles.
    pub stripe_api_base: String,
    /// Bound on every outbound Stripe call, in seconds.
    pub stripe_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));
        let site_url = env::var("SITE_URL").unwrap_or_else(|_| base_url.clone());

        let session_endpoint = env::var("SESSION_ENDPOINT")
            .unwrap_or_else(|_| format!("{}/api/auth/session", site_url));

        let stripe_timeout_secs: u64 = env::var("STRIPE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(15);

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "portal.db".to_string()),
            base_url,
            site_url,
            session_endpoint,
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            stripe_timeout_secs,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
