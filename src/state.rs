use crate::config::settings::AppConfig;
use crate::modules::upload::service::UploadProducer;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub producer: UploadProducer,
}

impl AppState {
    pub fn new(config: AppConfig, producer: UploadProducer) -> Self {
        Self { config, producer }
    }
}
