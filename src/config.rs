use std::env;

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub webhook_base_url: String,
    pub webhook_secret: String,
    pub webhook_max_retries: i32,
    pub whatsapp_api_base_url: String,
    pub whatsapp_api_key: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");
        let webhook_secret = env::var("WEBHOOK_SECRET").expect("WEBHOOK_SECRET must be set");

        let webhook_base_url = env::var("WEBHOOK_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5678/webhook".to_string());
        let webhook_max_retries = env::var("WORKFLOW_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(5);

        let whatsapp_api_base_url =
            env::var("WHATSAPP_API_BASE_URL").expect("WHATSAPP_API_BASE_URL must be set");
        let whatsapp_api_key =
            env::var("WHATSAPP_API_KEY").expect("WHATSAPP_API_KEY must be set");

        Config {
            database_url,
            frontend_origin,
            webhook_base_url,
            webhook_secret,
            webhook_max_retries,
            whatsapp_api_base_url,
            whatsapp_api_key,
        }
    }
}
