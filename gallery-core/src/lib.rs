mod client;
mod types;

pub use client::{ApiErrorClass, GalleryClient, GalleryError};
pub use types::{GalleryItem, ListPage, natural_cmp};
