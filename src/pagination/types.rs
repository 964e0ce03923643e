//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default upper bound on pages per cursor
pub const DEFAULT_MAX_PAGES: u64 = 10_000;

/// Where a page starts; stored in bookmarks so a run can resume mid-stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePosition {
    /// Opaque server token
    Token(String),
    /// Record offset
    Offset(u64),
    /// First day of a date window
    Window(NaiveDate),
}

impl std::fmt::Display for PagePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Token(token) => write!(f, "token {token}"),
            Self::Offset(offset) => write!(f, "offset {offset}"),
            Self::Window(start) => write!(f, "window {start}"),
        }
    }
}

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available starting here
    Continue(PagePosition),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// Request-side view of a page: extra query params plus `{{ page.* }}` values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    /// Position being requested (`None` for the first page of a token stream)
    pub position: Option<PagePosition>,
    /// Query parameters to add
    pub query: Vec<(String, String)>,
    /// Template variables exposed as `page.*`
    pub vars: Value,
}

/// Configuration for pagination behavior
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationConfig {
    /// Single page
    #[default]
    None,

    /// Server-issued next-page token
    Token {
        /// Path to the token in the response body
        token_path: String,
        /// Query parameter that carries the token; omit for body-carried
        /// tokens referenced as `{{ page.token }}`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_param: Option<String>,
    },

    /// Offset/limit pagination
    Offset {
        /// Query parameter name for offset
        #[serde(default = "default_offset_param")]
        offset_param: String,
        /// Query parameter name for limit
        #[serde(default = "default_limit_param")]
        limit_param: String,
        /// Records requested per page
        limit: u64,
    },

    /// Consecutive date windows from a start date up to today
    DateWindow {
        /// Days per window
        #[serde(default = "default_window_days")]
        window_days: u32,
    },
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_window_days() -> u32 {
    28
}

impl PaginationConfig {
    /// Create token pagination config carried in a query parameter
    pub fn token(token_path: impl Into<String>, token_param: impl Into<String>) -> Self {
        Self::Token {
            token_path: token_path.into(),
            token_param: Some(token_param.into()),
        }
    }

    /// Create offset pagination config with default parameter names
    pub fn offset(limit: u64) -> Self {
        Self::Offset {
            offset_param: default_offset_param(),
            limit_param: default_limit_param(),
            limit,
        }
    }

    /// Create date window pagination config
    pub fn date_window(window_days: u32) -> Self {
        Self::DateWindow { window_days }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Token { .. } => "token",
            Self::Offset { .. } => "offset",
            Self::DateWindow { .. } => "date_window",
        }
    }

    /// Whether a bookmark position was produced by this policy
    pub fn accepts(&self, position: &PagePosition) -> bool {
        matches!(
            (self, position),
            (Self::Token { .. }, PagePosition::Token(_))
                | (Self::Offset { .. }, PagePosition::Offset(_))
                | (Self::DateWindow { .. }, PagePosition::Window(_))
        )
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync + std::fmt::Debug {
    /// Position of the first page when there is nothing to resume from
    fn start(&self) -> Option<PagePosition>;

    /// Describe the request for a page
    fn request(&self, position: Option<&PagePosition>) -> PageRequest;

    /// Compute where the following page starts from this page's payload
    fn next(&self, position: Option<&PagePosition>, body: &Value, records_count: usize)
        -> NextPage;
}
