//! Cursor and offset paging shared by the list endpoints.
//!
//! Cursors are plain entity ids on the wire. Queries resolve the cursor row's
//! `(sort key, id)` and continue strictly after it, so rows with equal sort
//! keys are neither skipped nor repeated across pages.

use serde::{Deserialize, Serialize};

pub const MAX_LIMIT: u32 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: u32,
}

impl PageQuery {
    /// Apply the endpoint default and clamp to `1..=MAX_LIMIT`. Empty cursors count as absent.
    pub fn resolve(self, default_limit: u32) -> PageRequest {
        PageRequest {
            cursor: self.cursor.filter(|c| !c.is_empty()),
            limit: self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// A full page hands out its last id as the next cursor; a short page ends the list.
    pub fn from_rows(rows: Vec<T>, limit: u32, id_of: impl Fn(&T) -> &str) -> Self {
        let next_cursor = if rows.len() == limit as usize {
            rows.last().map(|row| id_of(row).to_string())
        } else {
            None
        };
        Page {
            data: rows,
            next_cursor,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OffsetQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRequest {
    pub page: u32,
    pub limit: u32,
}

impl OffsetQuery {
    pub fn resolve(self, default_limit: u32) -> OffsetRequest {
        OffsetRequest {
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT),
        }
    }
}

impl OffsetRequest {
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPage {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

impl OffsetPage {
    pub fn new(request: OffsetRequest, total: i64) -> Self {
        let limit = i64::from(request.limit);
        let total_pages = (total + limit - 1) / limit;
        OffsetPage {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
            has_more: i64::from(request.page) < total_pages,
        }
    }
}
