#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub worker_server: WorkerServer,
    pub database: Database,
    pub redis: Redis,
    pub x_oauth: XOAuth,
    pub stripe: Stripe,
    pub ai: Ai,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Redis {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct XOAuth {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub bearer_token: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub pro_price_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct Ai {
    pub anthropic_api_key: String,
    pub mistral_api_key: String,
    pub grok_api_key: String,
    pub grok_base_url: String,
}

#[derive(Debug, Clone)]
pub struct SessionSecret {
    pub secret: String,
    pub expiration_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct EncryptionSecret {
    pub key: String,
}
