//! State transitions of a listing.
//!
//! Every function here validates the acting identity and the current
//! [`BookState`] and either applies the transition in place or returns the
//! reason it was refused, leaving the book untouched. None of them touch
//! storage or timestamps.

use covers_authz::Identity;
use covers_http::error::FieldError;
use uuid::Uuid;

use super::models::{Book, BookState, BorrowRequest, CreateBook, UpdateBook};
use crate::error::{LendingError, LendingResult};
use crate::utils;

const TEXT_MIN: usize = 1;
const TEXT_MAX: usize = 100;

/// Refuses the action unless `actor` owns the book.
pub fn ensure_owner(book: &Book, actor: &Identity, action: &str) -> LendingResult<()> {
    if book.is_owned_by(actor.user_id) {
        Ok(())
    } else {
        Err(LendingError::forbidden(format!(
            "only the owner may {action} this book"
        )))
    }
}

/// Queues `requester` for the book.
pub fn request_borrow(book: &mut Book, requester: &Identity) -> LendingResult<()> {
    if book.is_owned_by(requester.user_id) {
        return Err(LendingError::forbidden("owners cannot borrow their own book"));
    }

    let entry = BorrowRequest {
        user_id: requester.user_id,
        username: requester.username.clone(),
    };

    match book.state {
        BookState::Available => {
            book.state = BookState::Requested { queue: vec![entry] };
            Ok(())
        }
        BookState::Requested { ref mut queue } => {
            if queue.iter().any(|r| r.user_id == requester.user_id) {
                return Err(LendingError::conflict("you already requested this book"));
            }
            queue.push(entry);
            Ok(())
        }
        BookState::CheckedOut { .. } | BookState::Unavailable => Err(LendingError::conflict(
            format!("book is {} and cannot be requested", book.state.status()),
        )),
    }
}

/// Withdraws `requester`'s own pending request.
pub fn cancel_request(book: &mut Book, requester: &Identity) -> LendingResult<()> {
    let BookState::Requested { queue } = &mut book.state else {
        return Err(LendingError::not_found("borrow request", requester.user_id));
    };

    let before = queue.len();
    queue.retain(|r| r.user_id != requester.user_id);
    if queue.len() == before {
        return Err(LendingError::not_found("borrow request", requester.user_id));
    }
    if queue.is_empty() {
        book.state = BookState::Available;
    }
    Ok(())
}

/// Hands the book to a pending requester and drops every other request.
pub fn accept_request(book: &mut Book, requester_id: Uuid, owner: &Identity) -> LendingResult<()> {
    ensure_owner(book, owner, "accept requests for")?;

    let pending = book
        .state
        .requests()
        .iter()
        .any(|r| r.user_id == requester_id);
    if !pending {
        return Err(LendingError::not_found("borrow request", requester_id));
    }

    book.state = BookState::CheckedOut {
        borrower: requester_id,
    };
    Ok(())
}

/// Brings a checked-out book back. Either the owner or the borrower may do it.
pub fn return_book(book: &mut Book, actor: &Identity) -> LendingResult<()> {
    let BookState::CheckedOut { borrower } = book.state else {
        return Err(LendingError::conflict(format!(
            "book is {} and cannot be returned",
            book.status()
        )));
    };

    if actor.user_id != borrower && !book.is_owned_by(actor.user_id) {
        return Err(LendingError::forbidden(
            "only the owner or the borrower may return this book",
        ));
    }

    book.state = BookState::Available;
    Ok(())
}

/// Takes the listing off the shelf. Pending requests are discarded.
pub fn withdraw(book: &mut Book, owner: &Identity) -> LendingResult<()> {
    ensure_owner(book, owner, "withdraw")?;
    match book.state {
        BookState::CheckedOut { .. } => Err(LendingError::conflict(
            "a checked-out book cannot be withdrawn",
        )),
        _ => {
            book.state = BookState::Unavailable;
            Ok(())
        }
    }
}

/// Puts a withdrawn listing back on the shelf.
pub fn relist(book: &mut Book, owner: &Identity) -> LendingResult<()> {
    ensure_owner(book, owner, "relist")?;
    match book.state {
        BookState::Unavailable => {
            book.state = BookState::Available;
            Ok(())
        }
        _ => Err(LendingError::conflict(format!(
            "book is {} and cannot be relisted",
            book.status()
        ))),
    }
}

/// Checked, trimmed descriptive fields of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub external_catalog_id: Option<String>,
}

/// Validates the fields of a new listing.
pub fn validate_new(input: CreateBook) -> LendingResult<BookDetails> {
    let mut errors: Vec<FieldError> = Vec::new();
    let title = utils::required_text(
        "title",
        &input.title,
        TEXT_MIN,
        TEXT_MAX,
        "Please provide a title",
        &mut errors,
    );
    let author = utils::required_text(
        "author",
        &input.author,
        TEXT_MIN,
        TEXT_MAX,
        "Please provide an author name",
        &mut errors,
    );

    if !errors.is_empty() {
        return Err(LendingError::Validation(errors));
    }

    Ok(BookDetails {
        title,
        author,
        description: utils::trimmed(input.description),
        image_url: utils::trimmed(input.image_url),
        external_catalog_id: utils::trimmed(input.external_catalog_id),
    })
}

/// Applies an owner's edit. Nothing changes unless every field is valid.
pub fn edit(book: &mut Book, owner: &Identity, changes: UpdateBook) -> LendingResult<()> {
    ensure_owner(book, owner, "edit")?;

    let details = validate_new(CreateBook {
        title: changes.title.unwrap_or_else(|| book.title.clone()),
        author: changes.author.unwrap_or_else(|| book.author.clone()),
        description: changes.description.or_else(|| book.description.clone()),
        image_url: changes.image_url.or_else(|| book.image_url.clone()),
        external_catalog_id: changes
            .external_catalog_id
            .or_else(|| book.external_catalog_id.clone()),
    })?;

    book.title = details.title;
    book.author = details.author;
    book.description = details.description;
    book.image_url = details.image_url;
    book.external_catalog_id = details.external_catalog_id;
    Ok(())
}
