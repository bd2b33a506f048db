pub mod cache;
pub mod community;
pub mod error;
pub mod titles;

pub use cache::{CacheEntry, CacheStatus, DataSource};
pub use community::{CommunityMapping, parse_community_mapping, parse_community_mapping_file};
pub use error::DatError;
pub use titles::TitleCatalog;
