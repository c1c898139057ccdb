//! Book routes. Each method carries its own permission check so that an
//! unsupported method still answers 405 regardless of who asks.

use crate::handlers::{create_book, delete_book, list_books, show_book, update_book};
use crate::middleware::{require_permission, Permission};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post, MethodRouter},
    Router,
};

fn guarded(route: MethodRouter<AppState>, permission: Permission) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(permission, require_permission))
}

pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/books",
            guarded(get(list_books), Permission::BooksRead)
                .merge(guarded(post(create_book), Permission::BooksWrite)),
        )
        .route(
            "/v1/books/:id",
            guarded(get(show_book), Permission::BooksRead)
                .merge(guarded(patch(update_book).delete(delete_book), Permission::BooksWrite)),
        )
}
