//! Data models for docsync.
//!
//! - Page (plus the input and output shapes used around it)

pub mod page;

pub use page::{
    format_timestamp, Breadcrumb, NewPage, Page, PageNode, PathChange, DEFAULT_SEQUENCE,
};
