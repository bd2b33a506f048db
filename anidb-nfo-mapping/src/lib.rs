pub mod error;
pub mod fuzzy;
pub mod identity;
pub mod overrides;

pub use error::MappingError;
pub use fuzzy::{CaseMode, FuzzyMatcher, Match, MatchKind, MatchPolicy};
pub use identity::{IdentityMap, MappingSources, RefreshReport};
pub use overrides::OverrideStore;
