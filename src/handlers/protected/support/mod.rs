pub mod faq;
pub mod ticket;

pub use ticket::delete as ticket_delete;
pub use ticket::get as ticket_get;
pub use ticket::list as ticket_list;
pub use ticket::patch as ticket_patch;
pub use ticket::post as ticket_post;

pub use faq::categories as faq_categories;
pub use faq::delete as faq_delete;
pub use faq::get as faq_get;
pub use faq::list as faq_list;
pub use faq::patch as faq_patch;
pub use faq::post as faq_post;
