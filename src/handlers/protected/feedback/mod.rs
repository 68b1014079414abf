pub mod entry;
pub mod vote;

pub use entry::delete as entry_delete;
pub use entry::get as entry_get;
pub use entry::list as entry_list;
pub use entry::mine as entry_mine;
pub use entry::patch as entry_patch;
pub use entry::post as entry_post;

pub use vote::stats as vote_stats;
pub use vote::toggle as vote_toggle;
pub use vote::top_suggestions as vote_top_suggestions;
