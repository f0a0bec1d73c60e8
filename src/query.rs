//! The list pipeline: status filtering, quadrant derivation, substring
//! search, ordered sort with defined tie-breaks, and pagination. Pure over an
//! already-fetched snapshot so the REST API and the first-party UI cannot
//! drift apart.

use crate::models::{
    Pagination, Quadrant, TaskListResponse, TaskRecord, TaskStatus, TaskView,
};
use crate::retention::RetentionPolicy;
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 100;

/// Requested view. `Done` is a derived alias: it fetches stored `active`
/// rows and keeps only `done == true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Active,
    Done,
    Archived,
    Deleted,
}

impl StatusFilter {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "done" => Some(Self::Done),
            "archived" => Some(Self::Archived),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    pub fn stored_status(self) -> TaskStatus {
        match self {
            Self::Active | Self::Done => TaskStatus::Active,
            Self::Archived => TaskStatus::Archived,
            Self::Deleted => TaskStatus::Deleted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    CreatedAt,
    DueDate,
    Quadrant,
    Title,
}

impl OrderBy {
    /// Unknown keys fall back to `created_at`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "due_date" => Self::DueDate,
            "quadrant" => Self::Quadrant,
            "title" => Self::Title,
            _ => Self::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDir {
    Asc,
    Desc,
}

impl OrderDir {
    /// Anything other than `asc` is descending, the default.
    pub fn parse(raw: &str) -> Self {
        if raw == "asc" {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Asc => ordering,
            Self::Desc => ordering.reverse(),
        }
    }
}

/// Parsed list request. `status: None` means the caller named a view that
/// does not exist, which yields an empty result rather than an error.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub status: Option<StatusFilter>,
    pub quadrant: Option<Quadrant>,
    pub search: Option<String>,
    pub order_by: OrderBy,
    pub order_dir: OrderDir,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            status: Some(StatusFilter::Active),
            quadrant: None,
            search: None,
            order_by: OrderBy::CreatedAt,
            order_dir: OrderDir::Desc,
            limit: None,
            offset: 0,
        }
    }
}

impl ListOptions {
    /// Builds options from raw query-string values, mirroring the lenient
    /// HTTP contract: absent status defaults to `active`, unknown quadrant
    /// means "no filter", unparsable limit falls back to the default page
    /// size before clamping to [1, MAX_LIMIT], offset clamps to >= 0.
    pub fn from_raw(
        status: Option<&str>,
        quadrant: Option<&str>,
        search: Option<&str>,
        order_by: Option<&str>,
        order_dir: Option<&str>,
        limit: Option<&str>,
        offset: Option<&str>,
    ) -> Self {
        let status = match status {
            None | Some("") => Some(StatusFilter::Active),
            Some(raw) => StatusFilter::parse(raw),
        };

        let search = search
            .map(|raw| raw.trim().to_lowercase())
            .filter(|needle| !needle.is_empty());

        let limit = limit.map(|raw| {
            raw.parse::<u32>()
                .unwrap_or(DEFAULT_LIMIT)
                .clamp(1, MAX_LIMIT)
        });
        let offset = match limit {
            Some(_) => offset
                .and_then(|raw| raw.parse::<u32>().ok())
                .unwrap_or(0),
            None => 0,
        };

        Self {
            status,
            quadrant: quadrant.and_then(Quadrant::parse),
            search,
            order_by: order_by.map(OrderBy::parse).unwrap_or(OrderBy::CreatedAt),
            order_dir: order_dir.map(OrderDir::parse).unwrap_or(OrderDir::Desc),
            limit,
            offset,
        }
    }
}

/// Runs the pipeline over a snapshot of the owner's rows for the effective
/// stored status. Deterministic for a fixed snapshot and `now`.
pub fn run(
    tasks: Vec<TaskRecord>,
    options: &ListOptions,
    retention: RetentionPolicy,
    now: DateTime<Utc>,
) -> TaskListResponse {
    let mut tasks = tasks;

    // Derived done/active split; archive and trash views keep both.
    match options.status {
        Some(StatusFilter::Active) => tasks.retain(|task| !task.done),
        Some(StatusFilter::Done) => tasks.retain(|task| task.done),
        Some(StatusFilter::Deleted) => {
            tasks.retain(|task| !retention.is_expired(task.deleted_at, now));
        }
        Some(StatusFilter::Archived) => {}
        None => tasks.clear(),
    }

    if let Some(quadrant) = options.quadrant {
        tasks.retain(|task| task.quadrant() == quadrant);
    }

    if let Some(needle) = &options.search {
        tasks.retain(|task| {
            task.title.to_lowercase().contains(needle)
                || task.description.to_lowercase().contains(needle)
        });
    }

    // Vec::sort_by is stable, so equal-key tasks keep their pre-sort order.
    tasks.sort_by(|a, b| compare(a, b, options.order_by, options.order_dir));

    let total = tasks.len();

    let mut views: Vec<TaskView> = tasks.into_iter().map(TaskView::from).collect();
    let pagination = options.limit.map(|limit| {
        let start = (options.offset as usize).min(views.len());
        let end = (start + limit as usize).min(views.len());
        views = views[start..end].to_vec();
        Pagination {
            limit,
            offset: options.offset,
            returned: views.len(),
        }
    });

    TaskListResponse {
        tasks: views,
        total,
        pagination,
    }
}

fn compare(a: &TaskRecord, b: &TaskRecord, order_by: OrderBy, dir: OrderDir) -> Ordering {
    match order_by {
        OrderBy::CreatedAt => dir.apply(a.created_at.cmp(&b.created_at)),
        OrderBy::Quadrant => dir.apply(a.quadrant().rank().cmp(&b.quadrant().rank())),
        OrderBy::Title => dir.apply(a.title.to_lowercase().cmp(&b.title.to_lowercase())),
        // A missing or unreadable date sorts after any real date no matter
        // which direction was requested; only dated pairs honor it.
        OrderBy::DueDate => match (parse_due_date(&a.due_date), parse_due_date(&b.due_date)) {
            (Some(left), Some(right)) => dir.apply(left.cmp(&right)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    }
}

fn parse_due_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
