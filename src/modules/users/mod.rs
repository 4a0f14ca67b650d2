pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use covers_authz::TokenIssuer;
use covers_kernel::{InitCtx, Module};
use serde_json::json;

use super::error_response;

use routes::UsersState;
use service::UserService;

/// Accounts and sign-in.
pub struct UsersModule {
    state: UsersState,
}

impl UsersModule {
    pub fn new(service: Arc<UserService>, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            state: UsersState { service, tokens },
        }
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let accounts = self.state.service.collection().len().await;
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            accounts,
            "users module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/register": {
                    "post": {
                        "summary": "Register an account",
                        "tags": ["Users"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/RegisterUser" }
                                }
                            }
                        },
                        "responses": {
                            "201": auth_response("Account created"),
                            "409": error_response("Username or email already registered"),
                            "422": error_response("Invalid fields")
                        }
                    }
                },
                "/login": {
                    "post": {
                        "summary": "Sign in with email and password",
                        "tags": ["Users"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/LoginRequest" }
                                }
                            }
                        },
                        "responses": {
                            "200": auth_response("Signed in"),
                            "401": error_response("Invalid email or password")
                        }
                    }
                },
                "/me": {
                    "get": {
                        "summary": "Current user",
                        "tags": ["Users"],
                        "security": [{ "bearerAuth": [] }],
                        "responses": {
                            "200": {
                                "description": "The signed-in user",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/PublicUser" }
                                    }
                                }
                            },
                            "401": error_response("Missing or invalid token")
                        }
                    }
                },
                "/health": {
                    "get": {
                        "summary": "Users health check",
                        "tags": ["Users"],
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
                    "RegisterUser": {
                        "type": "object",
                        "properties": {
                            "username": { "type": "string", "minLength": 3, "maxLength": 30 },
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string", "minLength": 8 },
                            "street1": { "type": "string" },
                            "street2": { "type": "string" },
                            "zipCode": { "type": "string" }
                        },
                        "required": ["username", "email", "password"]
                    },
                    "LoginRequest": {
                        "type": "object",
                        "properties": {
                            "email": { "type": "string", "format": "email" },
                            "password": { "type": "string" }
                        },
                        "required": ["email", "password"]
                    },
                    "PublicUser": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "username": { "type": "string" },
                            "email": { "type": "string", "format": "email" },
                            "street1": { "type": "string", "nullable": true },
                            "street2": { "type": "string", "nullable": true },
                            "zipCode": { "type": "string", "nullable": true },
                            "createdAt": { "type": "string", "format": "date-time" }
                        },
                        "required": ["id", "username", "email", "createdAt"]
                    },
                    "AuthResponse": {
                        "type": "object",
                        "properties": {
                            "token": { "type": "string" },
                            "tokenType": { "type": "string", "example": "Bearer" },
                            "expiresIn": { "type": "integer", "description": "Seconds until the token expires" },
                            "user": { "$ref": "#/components/schemas/PublicUser" }
                        },
                        "required": ["token", "tokenType", "expiresIn", "user"]
                    }
                }
            }
        }))
    }
}

fn auth_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/AuthResponse" }
            }
        }
    })
}

pub fn create_module(service: Arc<UserService>, tokens: Arc<TokenIssuer>) -> Arc<dyn Module> {
    Arc::new(UsersModule::new(service, tokens))
}
