use std::{cmp::Ordering, collections::HashMap};

use covers_authz::Identity;
use covers_db::Collection;
use covers_http::error::FieldError;
use time::OffsetDateTime;
use uuid::Uuid;

use super::lifecycle;
use super::models::{
    Book, BookQuery, BookState, BookStatus, CreateBook, Listing, Paged, SortKey, SortOrder,
    UpdateBook,
};
use crate::error::{LendingError, LendingResult};
use crate::modules::users::models::{OwnerProfile, User};
use crate::utils;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 50;

/// Listing queries and lifecycle operations over the book collection.
///
/// Each mutation is one [`Collection::update`] call, so transitions on a
/// single book are applied one at a time and a refused transition leaves
/// the stored book unchanged.
pub struct BookService {
    books: Collection<Book>,
    users: Collection<User>,
}

impl BookService {
    pub fn new(books: Collection<Book>, users: Collection<User>) -> Self {
        Self { books, users }
    }

    pub fn collection(&self) -> &Collection<Book> {
        &self.books
    }

    /// Lists a new book owned by `owner`.
    pub async fn create(&self, owner: &Identity, input: CreateBook) -> LendingResult<Book> {
        let details = lifecycle::validate_new(input)?;
        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: Uuid::now_v7(),
            title: details.title,
            author: details.author,
            description: details.description,
            image_url: details.image_url,
            external_catalog_id: details.external_catalog_id,
            owner: owner.user_id,
            state: BookState::Available,
            created_at: now,
            updated_at: now,
        };

        let book = self.books.insert(book).await?;
        tracing::info!(book_id = %book.id, actor = %owner.username, title = %book.title, "book listed");
        Ok(book)
    }

    pub async fn get(&self, id: Uuid) -> LendingResult<Listing> {
        let book = self
            .books
            .get(id)
            .await
            .ok_or_else(|| LendingError::not_found("book", id))?;
        let owner_profile = self.users.get(book.owner).await.map(|u| OwnerProfile::from(&u));
        Ok(Listing {
            book,
            owner_profile,
        })
    }

    /// Books that can currently be requested, including ones with pending
    /// requests.
    pub async fn list_available(&self, query: BookQuery) -> LendingResult<Paged<Listing>> {
        self.list_by_status(BookQuery {
            status: Some(BookStatus::Available),
            ..query
        })
        .await
    }

    /// Filters, sorts and optionally pages the listings with the requested
    /// status (`available` when absent).
    pub async fn list_by_status(&self, query: BookQuery) -> LendingResult<Paged<Listing>> {
        let status = query.status.unwrap_or_default();
        let page = match query.page {
            Some(0) => {
                return Err(LendingError::Validation(vec![FieldError::new(
                    "page",
                    "must be at least 1",
                )]))
            }
            other => other,
        };

        let profiles = self.owner_profiles().await;
        let title = query.title.unwrap_or_default();
        let author = query.author.unwrap_or_default();
        let owner = query.owner.unwrap_or_default();

        let mut listings: Vec<Listing> = self
            .books
            .find(|book| book.status() == status)
            .await
            .into_iter()
            .map(|book| {
                let owner_profile = profiles.get(&book.owner).cloned();
                Listing {
                    book,
                    owner_profile,
                }
            })
            .filter(|listing| {
                utils::contains_ignore_case(&listing.book.title, &title)
                    && utils::contains_ignore_case(&listing.book.author, &author)
                    && utils::contains_ignore_case(owner_name(listing), &owner)
            })
            .collect();

        let sort = query.sort.unwrap_or_default();
        let order = query.order.unwrap_or_default();
        listings.sort_by(|a, b| {
            let ordering = compare(a, b, sort);
            match order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = listings.len();
        let Some(page) = page else {
            return Ok(Paged {
                items: listings,
                total,
                page: 1,
                page_size: total,
            });
        };

        let page_size = query
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let items = listings
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(Paged {
            items,
            total,
            page,
            page_size,
        })
    }

    /// Every book the caller owns, whatever its status.
    pub async fn list_mine(&self, identity: &Identity) -> Vec<Book> {
        let owner = identity.user_id;
        self.books.find(|book| book.is_owned_by(owner)).await
    }

    /// Books currently checked out to the caller.
    pub async fn list_borrowing(&self, identity: &Identity) -> Vec<Book> {
        let borrower = identity.user_id;
        self.books
            .find(|book| book.state.borrower() == Some(borrower))
            .await
    }

    pub async fn request_borrow(&self, id: Uuid, requester: &Identity) -> LendingResult<Book> {
        self.transition(id, requester, "borrow requested", |book| {
            lifecycle::request_borrow(book, requester)
        })
        .await
    }

    pub async fn cancel_request(&self, id: Uuid, requester: &Identity) -> LendingResult<Book> {
        self.transition(id, requester, "borrow request cancelled", |book| {
            lifecycle::cancel_request(book, requester)
        })
        .await
    }

    pub async fn accept_request(
        &self,
        id: Uuid,
        requester_id: Uuid,
        owner: &Identity,
    ) -> LendingResult<Book> {
        self.transition(id, owner, "borrow request accepted", |book| {
            lifecycle::accept_request(book, requester_id, owner)
        })
        .await
    }

    pub async fn return_book(&self, id: Uuid, actor: &Identity) -> LendingResult<Book> {
        self.transition(id, actor, "book returned", |book| {
            lifecycle::return_book(book, actor)
        })
        .await
    }

    pub async fn withdraw(&self, id: Uuid, owner: &Identity) -> LendingResult<Book> {
        self.transition(id, owner, "book withdrawn", |book| {
            lifecycle::withdraw(book, owner)
        })
        .await
    }

    pub async fn relist(&self, id: Uuid, owner: &Identity) -> LendingResult<Book> {
        self.transition(id, owner, "book relisted", |book| {
            lifecycle::relist(book, owner)
        })
        .await
    }

    pub async fn update(
        &self,
        id: Uuid,
        owner: &Identity,
        changes: UpdateBook,
    ) -> LendingResult<Book> {
        self.transition(id, owner, "book edited", |book| {
            lifecycle::edit(book, owner, changes)
        })
        .await
    }

    /// Removes the listing outright, whatever its status.
    pub async fn delete(&self, id: Uuid, owner: &Identity) -> LendingResult<()> {
        let removed = self
            .books
            .remove_if(id, |book| lifecycle::ensure_owner(book, owner, "delete"))
            .await?;
        tracing::info!(book_id = %id, actor = %owner.username, status = %removed.status(), "book deleted");
        Ok(())
    }

    async fn transition<F>(
        &self,
        id: Uuid,
        actor: &Identity,
        event: &'static str,
        apply: F,
    ) -> LendingResult<Book>
    where
        F: FnOnce(&mut Book) -> LendingResult<()>,
    {
        let result = self
            .books
            .update(id, |book| {
                apply(book)?;
                book.updated_at = OffsetDateTime::now_utc();
                Ok::<(), LendingError>(())
            })
            .await;

        match &result {
            Ok(book) => {
                tracing::info!(book_id = %id, actor = %actor.username, status = %book.status(), "{event}")
            }
            Err(err) => {
                tracing::debug!(book_id = %id, actor = %actor.username, %err, "transition refused")
            }
        }
        result
    }

    async fn owner_profiles(&self) -> HashMap<Uuid, OwnerProfile> {
        self.users
            .all()
            .await
            .iter()
            .map(|user| (user.id, OwnerProfile::from(user)))
            .collect()
    }
}

fn owner_name(listing: &Listing) -> &str {
    listing
        .owner_profile
        .as_ref()
        .map(|p| p.username.as_str())
        .unwrap_or_default()
}

fn compare(a: &Listing, b: &Listing, key: SortKey) -> Ordering {
    let by_text = |x: &str, y: &str| x.to_lowercase().cmp(&y.to_lowercase());
    match key {
        SortKey::CreatedAt => a.book.created_at.cmp(&b.book.created_at),
        SortKey::Title => by_text(&a.book.title, &b.book.title),
        SortKey::Author => by_text(&a.book.author, &b.book.author),
        SortKey::Owner => by_text(owner_name(a), owner_name(b)),
    }
    .then_with(|| a.book.id.cmp(&b.book.id))
}
