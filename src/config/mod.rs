mod settings;

pub use settings::{GatewayConfig, LLMConfig, Settings};
