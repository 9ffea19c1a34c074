pub mod article;
pub mod comment;
pub mod event;
pub mod hot_article;
pub mod response;

pub use response::ApiResponse;
