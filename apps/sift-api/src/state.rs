use std::sync::Arc;

use sift_service::SiftService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SiftService>,
}
impl AppState {
	pub async fn new(config: sift_config::Config) -> color_eyre::Result<Self> {
		let service = SiftService::from_config(&config).await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: SiftService) -> Self {
		Self { service: Arc::new(service) }
	}
}
