use crate::config::HttpConfig;
use reqwest::Client;

pub fn build_client(config: &HttpConfig) -> Client {
    Client::builder()
        .user_agent(concat!("maison-import/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}
