pub mod access;
pub mod role;

pub use role::delete as role_delete;
pub use role::get as role_get;
pub use role::list as role_list;
pub use role::patch as role_patch;
pub use role::post as role_post;

pub use access::assign as access_assign;
pub use access::check as access_check;
pub use access::create_defaults as access_create_defaults;
pub use access::mine as access_mine;
