// ── Session state ──
//
// The word cache plus the row index the view is built from.

mod rows;
mod word_cache;

pub use rows::RowIndex;
pub use word_cache::WordCache;
