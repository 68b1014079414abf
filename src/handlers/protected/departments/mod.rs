pub mod department;
pub mod member;

pub use department::delete as department_delete;
pub use department::get as department_get;
pub use department::list as department_list;
pub use department::move_to as department_move;
pub use department::patch as department_patch;
pub use department::post as department_post;
pub use department::structure as department_structure;

pub use member::add as member_add;
pub use member::hierarchy as member_hierarchy;
pub use member::remove as member_remove;
pub use member::set_head as member_set_head;
