use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, FromRef, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use covers_authz::{Identity, TokenIssuer};
use covers_http::{
    error::AppError,
    extract::{ApiJson, ApiPath},
};
use uuid::Uuid;

use super::models::{AcceptRequest, Book, BookQuery, CreateBook, Listing, UpdateBook};
use super::service::BookService;

/// Total number of matches, independent of paging.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

#[derive(Clone)]
pub struct BooksState {
    pub service: Arc<BookService>,
    pub tokens: Arc<TokenIssuer>,
}

impl FromRef<BooksState> for Arc<TokenIssuer> {
    fn from_ref(state: &BooksState) -> Self {
        state.tokens.clone()
    }
}

pub fn router(state: BooksState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/health", get(health_check))
        .route("/mine", get(list_mine))
        .route("/borrowing", get(list_borrowing))
        .route(
            "/{id}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .route("/{id}/request", patch(request_borrow))
        .route("/{id}/cancel", patch(cancel_request))
        .route("/{id}/accept", patch(accept_request))
        .route("/{id}/return", patch(return_book))
        .route("/{id}/withdraw", patch(withdraw))
        .route("/{id}/relist", patch(relist))
        .with_state(state)
}

async fn list_books(
    State(state): State<BooksState>,
    query: Result<Query<BookQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let page = state.service.list_by_status(query).await?;
    Ok((
        [(TOTAL_COUNT_HEADER, page.total.to_string())],
        Json(page.items),
    ))
}

async fn get_book(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Listing>, AppError> {
    Ok(Json(state.service.get(id).await?))
}

async fn list_mine(State(state): State<BooksState>, identity: Identity) -> Json<Vec<Book>> {
    Json(state.service.list_mine(&identity).await)
}

async fn list_borrowing(State(state): State<BooksState>, identity: Identity) -> Json<Vec<Book>> {
    Json(state.service.list_borrowing(&identity).await)
}

async fn create_book(
    State(state): State<BooksState>,
    identity: Identity,
    ApiJson(input): ApiJson<CreateBook>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let book = state.service.create(&identity, input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
    ApiJson(changes): ApiJson<UpdateBook>,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.service.update(id, &identity, changes).await?))
}

async fn delete_book(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
) -> Result<StatusCode, AppError> {
    state.service.delete(id, &identity).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_borrow(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.service.request_borrow(id, &identity).await?))
}

async fn cancel_request(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.service.cancel_request(id, &identity).await?))
}

async fn accept_request(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
    ApiJson(body): ApiJson<AcceptRequest>,
) -> Result<Json<Book>, AppError> {
    let book = state
        .service
        .accept_request(id, body.requester_id, &identity)
        .await?;
    Ok(Json(book))
}

async fn return_book(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.service.return_book(id, &identity).await?))
}

async fn withdraw(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.service.withdraw(id, &identity).await?))
}

async fn relist(
    State(state): State<BooksState>,
    ApiPath(id): ApiPath<Uuid>,
    identity: Identity,
) -> Result<Json<Book>, AppError> {
    Ok(Json(state.service.relist(id, &identity).await?))
}

async fn health_check() -> &'static str {
    "Books module is healthy"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::users::models::User;
    use axum::{
        body::{to_bytes, Body},
        extract::Request,
        http::{header, Method},
        response::Response,
    };
    use covers_db::Collection;
    use serde_json::{json, Value};
    use time::OffsetDateTime;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        tokens: Arc<TokenIssuer>,
        users: Collection<User>,
    }

    impl TestApp {
        fn new() -> Self {
            let tokens = Arc::new(TokenIssuer::new("books-routes-secret", "covers", 1));
            let users = Collection::new();
            let service = Arc::new(BookService::new(Collection::new(), users.clone()));
            Self {
                router: router(BooksState {
                    service,
                    tokens: tokens.clone(),
                }),
                tokens,
                users,
            }
        }

        /// Registers a user directly and returns `(id, bearer token)`.
        async fn sign_in(&self, username: &str) -> (Uuid, String) {
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: Uuid::now_v7(),
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: String::new(),
                street1: Some("1 Harbor Way".to_string()),
                street2: None,
                zip_code: Some("99901".to_string()),
                created_at: now,
                updated_at: now,
            };
            self.users.insert(user.clone()).await.unwrap();
            let token = self.tokens.issue(user.id, &user.username, &user.email).unwrap();
            (user.id, token)
        }

        async fn call(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            let body = match body {
                Some(value) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };
            self.router
                .clone()
                .oneshot(builder.body(body).unwrap())
                .await
                .unwrap()
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn lending_flow_over_http() {
        let app = TestApp::new();
        let (_, alice) = app.sign_in("eagleeyeed").await;
        let (bob_id, bob) = app.sign_in("bearberrybuddy").await;

        let response = app
            .call(
                Method::POST,
                "/",
                Some(&alice),
                Some(json!({"title": "Dune", "author": "Frank Herbert"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "available");

        let response = app.call(Method::GET, "/", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[TOTAL_COUNT_HEADER], "1");
        let listed = json_body(response).await;
        assert_eq!(listed[0]["ownerProfile"]["username"], "eagleeyeed");

        let response = app
            .call(Method::PATCH, &format!("/{id}/request"), Some(&bob), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["requestedBy"][0]["username"], "bearberrybuddy");

        let response = app
            .call(
                Method::PATCH,
                &format!("/{id}/accept"),
                Some(&alice),
                Some(json!({"requesterId": bob_id})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let accepted = json_body(response).await;
        assert_eq!(accepted["status"], "checked-out");
        assert_eq!(accepted["currentBorrower"], bob_id.to_string());
        assert_eq!(accepted["requestedBy"], json!([]));

        let response = app.call(Method::GET, "/borrowing", Some(&bob), None).await;
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

        let response = app.call(Method::GET, "/", None, None).await;
        assert_eq!(response.headers()[TOTAL_COUNT_HEADER], "0");

        let response = app
            .call(Method::PATCH, &format!("/{id}/return"), Some(&bob), None)
            .await;
        assert_eq!(json_body(response).await["status"], "available");

        let response = app
            .call(Method::DELETE, &format!("/{id}"), Some(&alice), None)
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.call(Method::GET, &format!("/{id}"), None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let app = TestApp::new();
        let response = app.call(Method::GET, "/mine", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .call(
                Method::POST,
                "/",
                Some("not-a-token"),
                Some(json!({"title": "Dune", "author": "Frank Herbert"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn errors_map_to_statuses() {
        let app = TestApp::new();
        let (_, alice) = app.sign_in("tundratraveler").await;

        let response = app
            .call(Method::POST, "/", Some(&alice), Some(json!({"title": "", "author": ""})))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["error"]["details"].as_array().unwrap().len(), 2);

        let created = json_body(
            app.call(
                Method::POST,
                "/",
                Some(&alice),
                Some(json!({"title": "Emma", "author": "Jane Austen"})),
            )
            .await,
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let response = app
            .call(Method::PATCH, &format!("/{id}/request"), Some(&alice), None)
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .call(Method::PATCH, &format!("/{id}/relist"), Some(&alice), None)
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .call(
                Method::PATCH,
                &format!("/{}/request", Uuid::now_v7()),
                Some(&alice),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .call(Method::PATCH, &format!("/{id}/cancel"), Some(&alice), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn malformed_input_gets_the_error_envelope() {
        let app = TestApp::new();
        let (_, alice) = app.sign_in("fjordfollower").await;

        let response = app
            .call(Method::POST, "/", Some(&alice), Some(json!({"author": "Herbert"})))
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"][0]["field"], "title");

        let response = app.call(Method::GET, "/not-a-uuid", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "bad_request");

        let created = json_body(
            app.call(
                Method::POST,
                "/",
                Some(&alice),
                Some(json!({"title": "Dune", "author": "Frank Herbert"})),
            )
            .await,
        )
        .await;
        let id = created["id"].as_str().unwrap();

        let response = app
            .call(
                Method::PATCH,
                &format!("/{id}/accept"),
                Some(&alice),
                Some(json!({"requesterId": "someone"})),
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(response).await["error"]["details"][0]["field"],
            "requesterId"
        );

        let response = app
            .router
            .clone()
            .oneshot(
                Request::post("/")
                    .header(header::AUTHORIZATION, format!("Bearer {alice}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"title\": "))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn cancel_withdraws_only_the_callers_request() {
        let app = TestApp::new();
        let (_, alice) = app.sign_in("ravenreveler").await;
        let (_, bob) = app.sign_in("whalewatcher").await;
        let (carol_id, carol) = app.sign_in("totemcarver").await;

        let created = json_body(
            app.call(
                Method::POST,
                "/",
                Some(&alice),
                Some(json!({"title": "White Fang", "author": "Jack London"})),
            )
            .await,
        )
        .await;
        let id = created["id"].as_str().unwrap();

        for token in [&bob, &carol] {
            let response = app
                .call(Method::PATCH, &format!("/{id}/request"), Some(token), None)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .call(Method::PATCH, &format!("/{id}/cancel"), Some(&bob), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let book = json_body(response).await;
        assert_eq!(book["status"], "available");
        assert_eq!(book["requestedBy"].as_array().unwrap().len(), 1);
        assert_eq!(book["requestedBy"][0]["userId"], carol_id.to_string());

        let response = app
            .call(Method::PATCH, &format!("/{id}/cancel"), Some(&bob), None)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .call(Method::PATCH, &format!("/{id}/cancel"), None, None)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn list_query_is_applied() {
        let app = TestApp::new();
        let (_, alice) = app.sign_in("pinetreepioneer").await;
        for (title, author) in [
            ("Dune", "Frank Herbert"),
            ("Emma", "Jane Austen"),
            ("Persuasion", "Jane Austen"),
        ] {
            app.call(
                Method::POST,
                "/",
                Some(&alice),
                Some(json!({"title": title, "author": author})),
            )
            .await;
        }

        let response = app
            .call(
                Method::GET,
                "/?author=austen&sort=title&order=desc&page=1&pageSize=1",
                None,
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[TOTAL_COUNT_HEADER], "2");
        let items = json_body(response).await;
        assert_eq!(items.as_array().unwrap().len(), 1);
        assert_eq!(items[0]["title"], "Persuasion");

        let response = app.call(Method::GET, "/?sort=price", None, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "bad_request");
    }
}
