pub mod compiler;
pub mod filter;
pub mod predicate;
pub mod render;

use regex::Regex;

pub use compiler::{QueryCompiler, QueryPlan};
pub use filter::{SortOrder, UserQuery};
pub use predicate::{Operator, OrderBy, Predicate, Projection};
pub use render::{Dialect, Statement};

lazy_static::lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .expect("identifier pattern is valid");
}

/// Plain SQL identifier: letters, digits and underscores, not starting
/// with a digit.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}
