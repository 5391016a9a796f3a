//! Search result model: hits, lazily loaded results and grouping.

pub mod grouping;
pub mod result;
pub mod results;

pub use self::grouping::{DayGroup, FieldGroup};
pub use self::result::{Projection, SearchResult};
pub use self::results::{SearchResults, SearchResultsIter};
