mod error;
mod index;
mod normalize;
mod table;

pub use error::{Result, ScanError};
pub use index::{Category, LookupOutcome, MembershipIndex, TierLabel};
pub use normalize::{normalize, separator_variants};
pub use table::{parse_table, strip_header_row};
