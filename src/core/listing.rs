//! Paged listings of a school's outgoing and incoming transfers.

use crate::{
    config::transfer::TransferConfig,
    entities::{Transfer, TransferStatus, transfer},
    errors::Result,
};
use sea_orm::{Condition, PaginatorTrait, QueryOrder, prelude::*};
use serde::Serialize;
use tracing::{debug, instrument};

const PRIMARY_PREFIXES: &[&str] = &["NURSERY", "KG", "PRIMARY", "BASIC", "PRY"];
const SECONDARY_PREFIXES: &[&str] = &["JSS", "SSS", "SS"];

/// Broad school section a class level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchoolType {
    /// Nursery, kindergarten and primary classes
    Primary,
    /// Junior and senior secondary classes
    Secondary,
}

impl SchoolType {
    const fn prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Primary => PRIMARY_PREFIXES,
            Self::Secondary => SECONDARY_PREFIXES,
        }
    }

    /// Classifies a class level name such as "JSS2" or "Primary 4".
    #[must_use]
    pub fn of_class_level(level: &str) -> Option<Self> {
        let level = level.trim().to_ascii_uppercase();
        [Self::Primary, Self::Secondary]
            .into_iter()
            .find(|kind| kind.prefixes().iter().any(|p| level.starts_with(p)))
    }

    fn condition(self) -> Condition {
        self.prefixes()
            .iter()
            .fold(Condition::any(), |cond, prefix| {
                cond.add(transfer::Column::ClassLevel.starts_with(*prefix))
            })
    }
}

/// Filters and paging for a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Only transfers in this status
    pub status: Option<TransferStatus>,
    /// 1-based page number; 0 is treated as 1
    pub page: u64,
    /// Page size; 0 means the configured default
    pub limit: u64,
    /// Only transfers whose class level belongs to this section
    pub school_type: Option<SchoolType>,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    /// Rows on this page
    pub items: Vec<T>,
    /// Rows matching the filters across all pages
    pub total: u64,
    /// 1-based page number returned
    pub page: u64,
    /// Page size used
    pub limit: u64,
    /// Number of pages at this page size
    pub total_pages: u64,
}

/// Which side of the transfer the school is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outgoing,
    Incoming,
}

/// Transfers the school issued TACs for, newest first.
pub async fn list_outgoing<C>(
    db: &C,
    config: &TransferConfig,
    school_id: Uuid,
    query: &ListQuery,
) -> Result<Page<transfer::Model>>
where
    C: ConnectionTrait,
{
    list(db, config, school_id, Direction::Outgoing, query).await
}

/// Transfers the school has claimed as destination, newest first.
pub async fn list_incoming<C>(
    db: &C,
    config: &TransferConfig,
    school_id: Uuid,
    query: &ListQuery,
) -> Result<Page<transfer::Model>>
where
    C: ConnectionTrait,
{
    list(db, config, school_id, Direction::Incoming, query).await
}

#[instrument(skip(db, config))]
async fn list<C>(
    db: &C,
    config: &TransferConfig,
    school_id: Uuid,
    direction: Direction,
    query: &ListQuery,
) -> Result<Page<transfer::Model>>
where
    C: ConnectionTrait,
{
    let limit = match query.limit {
        0 => config.default_page_size,
        n => n.min(config.max_page_size),
    };
    let page = query.page.max(1);

    let mut select = match direction {
        Direction::Outgoing => {
            Transfer::find().filter(transfer::Column::FromSchoolId.eq(school_id))
        }
        Direction::Incoming => {
            Transfer::find().filter(transfer::Column::ToSchoolId.eq(school_id))
        }
    };
    if let Some(status) = query.status {
        select = select.filter(transfer::Column::Status.eq(status));
    }
    if let Some(school_type) = query.school_type {
        select = select.filter(school_type.condition());
    }

    let paginator = select
        .order_by_desc(transfer::Column::CreatedAt)
        .order_by_desc(transfer::Column::Id)
        .paginate(db, limit);
    let totals = paginator.num_items_and_pages().await?;
    // Past the last page; also keeps `limit * (page - 1)` from overflowing
    let items = if page > totals.number_of_pages {
        Vec::new()
    } else {
        paginator.fetch_page(page - 1).await?
    };

    debug!(
        total = totals.number_of_items,
        returned = items.len(),
        "Listed transfers"
    );

    Ok(Page {
        items,
        total: totals.number_of_items,
        page,
        limit,
        total_pages: totals.number_of_pages,
    })
}
