//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{NextPage, PagePosition, PageRequest, PaginationConfig, Paginator};
use crate::error::{Error, Result};
use crate::types::lookup_path;
use chrono::{Days, NaiveDate};
use serde_json::{json, Value};

// ============================================================================
// Token Pagination
// ============================================================================

/// Token-based pagination
///
/// The response carries the token for the next page. Pagination ends when
/// the token is absent, null or empty. A page with zero records but a
/// token still continues.
#[derive(Debug, Clone)]
pub struct TokenPaginator {
    /// Path to the token in the response body
    pub token_path: String,
    /// Query parameter that carries the token
    pub token_param: Option<String>,
}

impl TokenPaginator {
    /// Create a new token paginator
    pub fn new(token_path: impl Into<String>, token_param: Option<String>) -> Self {
        Self {
            token_path: token_path.into(),
            token_param,
        }
    }
}

impl Paginator for TokenPaginator {
    fn start(&self) -> Option<PagePosition> {
        None
    }

    fn request(&self, position: Option<&PagePosition>) -> PageRequest {
        let token = match position {
            Some(PagePosition::Token(token)) => Some(token.clone()),
            _ => None,
        };

        let query = match (&self.token_param, &token) {
            (Some(param), Some(token)) => vec![(param.clone(), token.clone())],
            _ => Vec::new(),
        };

        PageRequest {
            position: position.cloned(),
            query,
            vars: json!({ "token": token }),
        }
    }

    fn next(
        &self,
        _position: Option<&PagePosition>,
        body: &Value,
        _records_count: usize,
    ) -> NextPage {
        let token = match lookup_path(body, &self.token_path) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return NextPage::Done,
        };

        if token.is_empty() {
            NextPage::Done
        } else {
            NextPage::Continue(PagePosition::Token(token))
        }
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination
///
/// Uses offset and limit parameters; a short page is the last one.
/// Common patterns:
/// - `?offset=100&limit=50`
/// - `?skip=100&take=50`
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Query parameter name for limit
    pub limit_param: String,
    /// Records requested per page
    pub limit: u64,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(offset_param: impl Into<String>, limit_param: impl Into<String>, limit: u64) -> Self {
        Self {
            offset_param: offset_param.into(),
            limit_param: limit_param.into(),
            limit,
        }
    }

    fn offset_of(position: Option<&PagePosition>) -> u64 {
        match position {
            Some(PagePosition::Offset(offset)) => *offset,
            _ => 0,
        }
    }
}

impl Paginator for OffsetPaginator {
    fn start(&self) -> Option<PagePosition> {
        Some(PagePosition::Offset(0))
    }

    fn request(&self, position: Option<&PagePosition>) -> PageRequest {
        let offset = Self::offset_of(position);
        PageRequest {
            position: Some(PagePosition::Offset(offset)),
            query: vec![
                (self.offset_param.clone(), offset.to_string()),
                (self.limit_param.clone(), self.limit.to_string()),
            ],
            vars: json!({ "offset": offset, "limit": self.limit }),
        }
    }

    fn next(&self, position: Option<&PagePosition>, _body: &Value, records_count: usize) -> NextPage {
        if (records_count as u64) < self.limit {
            return NextPage::Done;
        }
        let offset = Self::offset_of(position);
        NextPage::Continue(PagePosition::Offset(offset + records_count as u64))
    }
}

// ============================================================================
// Date Window Pagination
// ============================================================================

/// Fixed-size date windows from an origin date up to today
///
/// Each page covers `[window_start, window_start + window_days)`. Empty
/// windows are normal and never end the sequence; it ends after the window
/// that contains `today`.
#[derive(Debug, Clone)]
pub struct DateWindowPaginator {
    /// Days per window
    pub window_days: u32,
    /// First window start when there is no bookmark
    pub origin: NaiveDate,
    /// Last day that must be covered
    pub today: NaiveDate,
}

impl DateWindowPaginator {
    /// Create a new date window paginator
    pub fn new(window_days: u32, origin: NaiveDate, today: NaiveDate) -> Self {
        Self {
            window_days: window_days.max(1),
            origin,
            today,
        }
    }

    fn window_start(&self, position: Option<&PagePosition>) -> NaiveDate {
        match position {
            Some(PagePosition::Window(start)) => *start,
            _ => self.origin,
        }
    }

    fn window_end(&self, start: NaiveDate) -> NaiveDate {
        start
            .checked_add_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(NaiveDate::MAX)
    }
}

impl Paginator for DateWindowPaginator {
    fn start(&self) -> Option<PagePosition> {
        Some(PagePosition::Window(self.origin))
    }

    fn request(&self, position: Option<&PagePosition>) -> PageRequest {
        let start = self.window_start(position);
        let end = self.window_end(start);
        PageRequest {
            position: Some(PagePosition::Window(start)),
            query: Vec::new(),
            vars: json!({
                "window_start": start.format("%Y-%m-%d").to_string(),
                "window_end": end.format("%Y-%m-%d").to_string(),
            }),
        }
    }

    fn next(&self, position: Option<&PagePosition>, _body: &Value, _records_count: usize) -> NextPage {
        let next_start = self.window_end(self.window_start(position));
        if next_start > self.today {
            NextPage::Done
        } else {
            NextPage::Continue(PagePosition::Window(next_start))
        }
    }
}

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn start(&self) -> Option<PagePosition> {
        None
    }

    fn request(&self, _position: Option<&PagePosition>) -> PageRequest {
        PageRequest::default()
    }

    fn next(&self, _position: Option<&PagePosition>, _body: &Value, _records_count: usize) -> NextPage {
        NextPage::Done
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Build the strategy for a pagination config.
///
/// `origin` is only needed by date windows; it is where the first window
/// starts when nothing is being resumed.
pub fn build_paginator(
    config: &PaginationConfig,
    origin: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<Box<dyn Paginator>> {
    Ok(match config {
        PaginationConfig::None => Box::new(NoPaginator),
        PaginationConfig::Token {
            token_path,
            token_param,
        } => Box::new(TokenPaginator::new(token_path, token_param.clone())),
        PaginationConfig::Offset {
            offset_param,
            limit_param,
            limit,
        } => {
            if *limit == 0 {
                return Err(Error::catalog("Offset pagination needs a limit above zero"));
            }
            Box::new(OffsetPaginator::new(offset_param, limit_param, *limit))
        }
        PaginationConfig::DateWindow { window_days } => {
            let origin = origin.ok_or_else(|| Error::missing_field("start_date"))?;
            Box::new(DateWindowPaginator::new(*window_days, origin, today))
        }
    })
}
