//! Filtering, sorting and pagination of listed pages
//!
//! List requests load a whole partition (latest or published pages of a
//! tenant and locale) and then narrow it in memory:
//!
//! 1. **Filter**: free text search, tags (any/all), field conditions
//! 2. **Sort**: one or more `field_ASC` / `field_DESC` keys
//! 3. **Paginate**: offset based, carried in an opaque cursor

pub mod cursor;
pub mod filter;
pub mod sort;

pub use cursor::{decode_cursor, encode_cursor};
pub use filter::{FieldCondition, ListProjection, ListWhere, ListWhereBuilder, TagsRule};
pub use sort::{sort_pages, validate_sort, SortDirection, SortSpec};
