//! Release helpers: docs versions, release tags and changelog files

pub mod changelog_file;
pub mod docs_target;
pub mod tags;

pub use changelog_file::FileUpdater;
pub use docs_target::map_ref;
pub use tags::{has_matching_release_tag_with_ref_names, local_tag_names};
