pub mod episodes;
pub mod error;
pub mod pipeline;
pub mod settings;

pub use episodes::{
    BoundEpisode, DisplayNumber, EpisodeBinder, EpisodeFileMatch, display_number, parse_filename,
};
pub use error::LibError;
pub use pipeline::{IdentifyRequest, Pipeline, ResolvedAnime};
pub use settings::{Settings, settings_path};
