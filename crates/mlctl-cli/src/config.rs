use mlctl_core::config::DEFAULT_ENDPOINT;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_endpoint: String::from(DEFAULT_ENDPOINT),
        }
    }
}
