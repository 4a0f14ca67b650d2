use std::fmt;

use covers_db::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::modules::users::models::OwnerProfile;

/// Stored availability of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookStatus {
    #[default]
    Available,
    CheckedOut,
    Unavailable,
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookStatus::Available => "available",
            BookStatus::CheckedOut => "checked-out",
            BookStatus::Unavailable => "unavailable",
        })
    }
}

/// A pending request to borrow a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub user_id: Uuid,
    pub username: String,
}

/// Where a book is in its lending lifecycle.
///
/// `Requested` is stored as status `available` with a non-empty
/// `requestedBy`; its queue is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BookState {
    #[default]
    Available,
    Requested {
        queue: Vec<BorrowRequest>,
    },
    CheckedOut {
        borrower: Uuid,
    },
    Unavailable,
}

impl BookState {
    pub fn status(&self) -> BookStatus {
        match self {
            BookState::Available | BookState::Requested { .. } => BookStatus::Available,
            BookState::CheckedOut { .. } => BookStatus::CheckedOut,
            BookState::Unavailable => BookStatus::Unavailable,
        }
    }

    /// Pending requests in arrival order.
    pub fn requests(&self) -> &[BorrowRequest] {
        match self {
            BookState::Requested { queue } => queue,
            _ => &[],
        }
    }

    pub fn borrower(&self) -> Option<Uuid> {
        match self {
            BookState::CheckedOut { borrower } => Some(*borrower),
            _ => None,
        }
    }
}

/// A listed book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BookRecord", into = "BookRecord")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub external_catalog_id: Option<String>,
    pub owner: Uuid,
    pub state: BookState,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Book {
    pub fn status(&self) -> BookStatus {
        self.state.status()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner == user_id
    }
}

impl Document for Book {
    const COLLECTION: &'static str = "books";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Stored and wire layout of a [`Book`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookRecord {
    id: Uuid,
    title: String,
    author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_catalog_id: Option<String>,
    #[serde(default)]
    status: BookStatus,
    owner: Uuid,
    #[serde(default)]
    requested_by: Vec<BorrowRequest>,
    #[serde(default)]
    current_borrower: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    updated_at: OffsetDateTime,
}

/// A stored document whose lifecycle fields contradict each other.
#[derive(Debug, Error)]
#[error("inconsistent book {id}: {reason}")]
pub struct InconsistentBook {
    id: Uuid,
    reason: &'static str,
}

impl TryFrom<BookRecord> for Book {
    type Error = InconsistentBook;

    fn try_from(record: BookRecord) -> Result<Self, Self::Error> {
        let fail = |reason| InconsistentBook {
            id: record.id,
            reason,
        };

        let state = match (record.status, record.current_borrower) {
            (BookStatus::CheckedOut, Some(borrower)) => {
                if borrower == record.owner {
                    return Err(fail("owner cannot be the borrower"));
                }
                if !record.requested_by.is_empty() {
                    return Err(fail("checked-out book has pending requests"));
                }
                BookState::CheckedOut { borrower }
            }
            (BookStatus::CheckedOut, None) => return Err(fail("checked-out book has no borrower")),
            (_, Some(_)) => return Err(fail("borrower set on a book that is not checked out")),
            (BookStatus::Unavailable, None) => {
                if !record.requested_by.is_empty() {
                    return Err(fail("unavailable book has pending requests"));
                }
                BookState::Unavailable
            }
            (BookStatus::Available, None) if record.requested_by.is_empty() => {
                BookState::Available
            }
            (BookStatus::Available, None) => {
                let queue = record.requested_by.clone();
                let duplicated = queue
                    .iter()
                    .enumerate()
                    .any(|(i, r)| queue[..i].iter().any(|p| p.user_id == r.user_id));
                if duplicated {
                    return Err(fail("user requested the book more than once"));
                }
                BookState::Requested { queue }
            }
        };

        Ok(Book {
            id: record.id,
            title: record.title,
            author: record.author,
            description: record.description,
            image_url: record.image_url,
            external_catalog_id: record.external_catalog_id,
            owner: record.owner,
            state,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl From<Book> for BookRecord {
    fn from(book: Book) -> Self {
        let status = book.status();
        let current_borrower = book.state.borrower();
        let requested_by = match book.state {
            BookState::Requested { queue } => queue,
            _ => Vec::new(),
        };

        BookRecord {
            id: book.id,
            title: book.title,
            author: book.author,
            description: book.description,
            image_url: book.image_url,
            external_catalog_id: book.external_catalog_id,
            status,
            owner: book.owner,
            requested_by,
            current_borrower,
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

/// A book together with its owner's public profile, as shown in listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(flatten)]
    pub book: Book,
    pub owner_profile: Option<OwnerProfile>,
}

/// Request model for listing a new book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub external_catalog_id: Option<String>,
}

/// Partial edit of a listing; absent fields are left alone and blank
/// optional fields are cleared.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub external_catalog_id: Option<String>,
}

/// Body of an accept call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptRequest {
    pub requester_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    CreatedAt,
    Title,
    Author,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filter, sort and page options of the listing endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    #[serde(default)]
    pub status: Option<BookStatus>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Substring of the owner's username.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub sort: Option<SortKey>,
    #[serde(default)]
    pub order: Option<SortOrder>,
    /// 1-based page number. Without it every match is returned.
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}
