pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use covers_authz::TokenIssuer;
use covers_kernel::{InitCtx, Module};
use serde_json::{json, Value};

use super::error_response;
use routes::BooksState;
use service::{BookService, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Book listings and the borrow workflow.
pub struct BooksModule {
    state: BooksState,
}

impl BooksModule {
    pub fn new(service: Arc<BookService>, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            state: BooksState { service, tokens },
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let listings = self.state.service.collection().len().await;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            listings,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books by status",
                        "tags": ["Books"],
                        "parameters": [
                            query_param("status", json!({
                                "type": "string",
                                "enum": ["available", "checked-out", "unavailable"],
                                "default": "available"
                            })),
                            query_param("title", json!({ "type": "string" })),
                            query_param("author", json!({ "type": "string" })),
                            query_param("owner", json!({ "type": "string" })),
                            query_param("sort", json!({
                                "type": "string",
                                "enum": ["createdAt", "title", "author", "owner"]
                            })),
                            query_param("order", json!({ "type": "string", "enum": ["asc", "desc"] })),
                            query_param("page", json!({ "type": "integer", "minimum": 1 })),
                            query_param("pageSize", json!({
                                "type": "integer",
                                "minimum": 1,
                                "maximum": MAX_PAGE_SIZE,
                                "default": DEFAULT_PAGE_SIZE
                            }))
                        ],
                        "responses": {
                            "200": {
                                "description": "Matching listings; x-total-count carries the unpaged total",
                                "headers": {
                                    "x-total-count": { "schema": { "type": "integer" } }
                                },
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Listing" }
                                        }
                                    }
                                }
                            },
                            "422": error_response("Invalid page")
                        }
                    },
                    "post": {
                        "summary": "List a new book",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "requestBody": json_body("CreateBook"),
                        "responses": {
                            "201": book_response("Book listed"),
                            "401": error_response("Missing or invalid token"),
                            "422": error_response("Invalid fields")
                        }
                    }
                },
                "/mine": {
                    "get": {
                        "summary": "Books owned by the caller",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": book_list_response("Owned books in every status"),
                            "401": error_response("Missing or invalid token")
                        }
                    }
                },
                "/borrowing": {
                    "get": {
                        "summary": "Books checked out to the caller",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": book_list_response("Borrowed books"),
                            "401": error_response("Missing or invalid token")
                        }
                    }
                },
                "/{id}": {
                    "get": {
                        "summary": "Get a listing",
                        "tags": ["Books"],
                        "parameters": [id_param()],
                        "responses": {
                            "200": {
                                "description": "The listing with its owner's profile",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Listing" }
                                    }
                                }
                            },
                            "404": error_response("Book not found")
                        }
                    },
                    "put": {
                        "summary": "Edit a listing",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "parameters": [id_param()],
                        "requestBody": json_body("UpdateBook"),
                        "responses": owner_transition_responses("Book updated")
                    },
                    "delete": {
                        "summary": "Delete a listing",
                        "tags": ["Books"],
                        "security": [{ "bearerAuth": [] }],
                        "parameters": [id_param()],
                        "responses": {
                            "204": { "description": "Book deleted" },
                            "401": error_response("Missing or invalid token"),
                            "403": error_response("Caller is not the owner"),
                            "404": error_response("Book not found")
                        }
                    }
                },
                "/{id}/request": transition("Request to borrow a book", None),
                "/{id}/cancel": transition("Cancel the caller's pending request", None),
                "/{id}/accept": transition("Accept a pending request", Some("AcceptRequest")),
                "/{id}/return": transition("Return a checked-out book", None),
                "/{id}/withdraw": transition("Take a listing off the shelf", None),
                "/{id}/relist": transition("Put a withdrawn listing back", None),
                "/health": {
                    "get": {
                        "summary": "Books health check",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": { "text/plain": { "schema": { "type": "string" } } }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "title": { "type": "string", "maxLength": 100 },
                            "author": { "type": "string", "maxLength": 100 },
                            "description": { "type": "string" },
                            "imageUrl": { "type": "string" },
                            "externalCatalogId": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["available", "checked-out", "unavailable"]
                            },
                            "owner": { "type": "string", "format": "uuid" },
                            "requestedBy": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/BorrowRequest" }
                            },
                            "currentBorrower": { "type": "string", "format": "uuid", "nullable": true },
                            "createdAt": { "type": "string", "format": "date-time" },
                            "updatedAt": { "type": "string", "format": "date-time" }
                        },
                        "required": [
                            "id", "title", "author", "status", "owner",
                            "requestedBy", "currentBorrower", "createdAt", "updatedAt"
                        ]
                    },
                    "Listing": {
                        "allOf": [
                            { "$ref": "#/components/schemas/Book" },
                            {
                                "type": "object",
                                "properties": {
                                    "ownerProfile": { "$ref": "#/components/schemas/OwnerProfile" }
                                }
                            }
                        ]
                    },
                    "OwnerProfile": {
                        "type": "object",
                        "nullable": true,
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "username": { "type": "string" },
                            "street1": { "type": "string", "nullable": true },
                            "street2": { "type": "string", "nullable": true },
                            "zipCode": { "type": "string", "nullable": true }
                        },
                        "required": ["id", "username"]
                    },
                    "BorrowRequest": {
                        "type": "object",
                        "properties": {
                            "userId": { "type": "string", "format": "uuid" },
                            "username": { "type": "string" }
                        },
                        "required": ["userId", "username"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "minLength": 1, "maxLength": 100 },
                            "author": { "type": "string", "minLength": 1, "maxLength": 100 },
                            "description": { "type": "string" },
                            "imageUrl": { "type": "string" },
                            "externalCatalogId": { "type": "string" }
                        },
                        "required": ["title", "author"]
                    },
                    "UpdateBook": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string", "minLength": 1, "maxLength": 100 },
                            "author": { "type": "string", "minLength": 1, "maxLength": 100 },
                            "description": { "type": "string" },
                            "imageUrl": { "type": "string" },
                            "externalCatalogId": { "type": "string" }
                        }
                    },
                    "AcceptRequest": {
                        "type": "object",
                        "properties": {
                            "requesterId": { "type": "string", "format": "uuid" }
                        },
                        "required": ["requesterId"]
                    }
                }
            }
        }))
    }
}

fn query_param(name: &str, schema: Value) -> Value {
    json!({ "name": name, "in": "query", "required": false, "schema": schema })
}

fn id_param() -> Value {
    json!({
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    })
}

fn json_body(schema: &str) -> Value {
    json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": format!("#/components/schemas/{schema}") }
            }
        }
    })
}

fn book_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": { "schema": { "$ref": "#/components/schemas/Book" } }
        }
    })
}

fn book_list_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Book" } }
            }
        }
    })
}

fn owner_transition_responses(success: &str) -> Value {
    json!({
        "200": book_response(success),
        "401": error_response("Missing or invalid token"),
        "403": error_response("Caller may not perform this action"),
        "404": error_response("Book or request not found"),
        "409": error_response("Book is in the wrong state"),
        "422": error_response("Invalid fields")
    })
}

fn transition(summary: &str, body: Option<&str>) -> Value {
    let mut operation = json!({
        "summary": summary,
        "tags": ["Books"],
        "security": [{ "bearerAuth": [] }],
        "parameters": [id_param()],
        "responses": owner_transition_responses("Updated book")
    });
    if let Some(schema) = body {
        operation["requestBody"] = json_body(schema);
    }
    json!({ "patch": operation })
}

pub fn create_module(service: Arc<BookService>, tokens: Arc<TokenIssuer>) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(service, tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use covers_db::Collection;

    #[test]
    fn openapi_documents_every_route() {
        let module = BooksModule::new(
            Arc::new(BookService::new(Collection::new(), Collection::new())),
            Arc::new(TokenIssuer::new("openapi-secret", "covers", 1)),
        );
        let spec = module.openapi().unwrap();
        let paths = spec["paths"].as_object().unwrap();
        for path in [
            "/", "/mine", "/borrowing", "/{id}", "/{id}/request", "/{id}/cancel",
            "/{id}/accept", "/{id}/return", "/{id}/withdraw", "/{id}/relist",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
        assert!(spec["paths"]["/{id}/accept"]["patch"]["requestBody"].is_object());
        assert!(spec["paths"]["/{id}/request"]["patch"].get("requestBody").is_none());
    }
}
