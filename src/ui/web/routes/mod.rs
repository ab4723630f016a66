pub(crate) mod download;
pub(crate) mod index;
pub(crate) mod jobs;
pub(crate) mod library;
pub(crate) mod status;
