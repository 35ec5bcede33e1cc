pub mod avatar;
mod page;
mod repository;

use axum::{Router, extract::DefaultBodyLimit, routing::{get, put}};

use crate::AppState;

pub use avatar::{AvatarUpload, MAX_AVATAR_BYTES};
pub use repository::{ProfileRepository, ProfileTarget, ProfileView};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(page::my_profile).put(page::save_my_profile))
        .route(
            "/me/avatar",
            // large enough that oversized images reach validation
            put(page::upload_avatar).layer(DefaultBodyLimit::max(2 * MAX_AVATAR_BYTES)),
        )
        .route("/{uuid}", get(page::profile))
}
