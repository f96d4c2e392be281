//! Pagination result types produced by [`crate::builder::Builder::paginate`]
//! and [`crate::builder::Builder::cursor_paginate`] (§4.1 "Pagination").
//! Presentation (rendering page links, serialising to JSON for an HTTP
//! response) is out of scope (§1): these are plain data carriers.

use crate::connection::Row;
use crate::cursor::Cursor;

/// Offset-based pagination result: total row count plus one page of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthAwarePaginator {
    pub items: Vec<Row>,
    pub total: u64,
    pub per_page: u64,
    pub current_page: u64,
}

impl LengthAwarePaginator {
    pub fn new(items: Vec<Row>, total: u64, per_page: u64, current_page: u64) -> Self {
        LengthAwarePaginator {
            items,
            total,
            per_page,
            current_page,
        }
    }

    pub fn last_page(&self) -> u64 {
        if self.per_page == 0 {
            return 1;
        }
        self.total.div_ceil(self.per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}

/// Keyset pagination result: one page of rows plus cursors for the adjacent
/// pages, each `None` when there is nothing further in that direction.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPaginator {
    pub items: Vec<Row>,
    pub per_page: u64,
    pub next_cursor: Option<Cursor>,
    pub prev_cursor: Option<Cursor>,
}

impl CursorPaginator {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}
