// Hookbridge Infrastructure - Configuration Service Adapter
// Implements: ConfigService (file-backed snapshot + change notification)

pub mod file_config;

pub use file_config::FileConfigService;
