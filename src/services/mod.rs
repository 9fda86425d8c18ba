//! 服务层模块

mod gateway_client;
mod menu_service;
mod prompt_service;
mod relay_service;
mod upload_store;

pub use gateway_client::{GatewayError, HttpMenuGateway, MenuGateway};
pub use menu_service::{parse_ocr_and_recommend, parse_recommendations, MenuService};
pub use prompt_service::PromptService;
pub use relay_service::RelayService;
pub use upload_store::{TempUpload, UploadStore};

#[cfg(test)]
pub(crate) use menu_service::tests as menu_doubles;
#[cfg(test)]
pub(crate) use relay_service::tests as relay_doubles;
