pub mod download;
pub mod json_body;
pub mod request_utils;
pub mod views;

pub use request_utils::{RemoteUser, RequestUtils, RequestUtilsConfig};
pub use views::{views_data, MiniJinjaViews, ViewEngine, ViewError};
