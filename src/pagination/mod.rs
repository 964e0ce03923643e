//! Pagination module
//!
//! Supports: Token, Offset/Limit, Date Window, single page
//!
//! # Overview
//!
//! A `PaginationConfig` is plain data on a stream definition. At sync time it
//! is turned into a `Paginator` strategy and wrapped in a `PageCursor`, which
//! yields page requests lazily and tracks the position to bookmark.

mod cursor;
mod strategies;
mod types;

pub use cursor::PageCursor;
pub use strategies::{
    build_paginator, DateWindowPaginator, NoPaginator, OffsetPaginator, TokenPaginator,
};
pub use types::{
    NextPage, PagePosition, PageRequest, PaginationConfig, Paginator, DEFAULT_MAX_PAGES,
};
