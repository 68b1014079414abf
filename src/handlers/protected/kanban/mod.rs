pub mod board;
pub mod card;
pub mod column;
pub mod comment;

pub use board::delete as board_delete;
pub use board::get as board_get;
pub use board::list as board_list;
pub use board::patch as board_patch;
pub use board::post as board_post;

pub use column::delete as column_delete;
pub use column::move_to as column_move;
pub use column::patch as column_patch;
pub use column::post as column_post;

pub use card::delete as card_delete;
pub use card::get as card_get;
pub use card::move_to as card_move;
pub use card::patch as card_patch;
pub use card::post as card_post;

pub use comment::delete as comment_delete;
pub use comment::patch as comment_patch;
pub use comment::post as comment_post;
