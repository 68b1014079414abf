pub mod account;

pub use account::delete as account_delete;
pub use account::get as account_get;
pub use account::list as account_list;
pub use account::patch as account_patch;
pub use account::post as account_post;
