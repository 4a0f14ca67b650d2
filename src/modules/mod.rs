pub mod books;
pub mod users;

use covers_kernel::ModuleRegistry;
use serde_json::json;

use crate::bootstrap::Services;

/// Register all project-specific modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, services: &Services) {
    registry.register_custom(users::create_module(
        services.users.clone(),
        services.tokens.clone(),
    ));
    registry.register_custom(books::create_module(
        services.books.clone(),
        services.tokens.clone(),
    ));
}

/// OpenAPI response object pointing at the shared error envelope.
pub(crate) fn error_response(description: &str) -> serde_json::Value {
    json!({
        "description": description,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/ErrorResponse" }
            }
        }
    })
}
