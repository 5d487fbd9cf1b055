mod bookmarks;
mod categories;
mod schema;
mod types;

pub use categories::DEFAULT_CATEGORY_TTL_HOURS;
pub use schema::Database;
pub use types::{Bookmark, DatabaseError};
