pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod credentials;
pub(crate) mod identify;
