pub mod activity;
pub mod comment;
pub mod opportunity;
pub mod pipeline;
pub mod stage;

pub use pipeline::delete as pipeline_delete;
pub use pipeline::get as pipeline_get;
pub use pipeline::list as pipeline_list;
pub use pipeline::patch as pipeline_patch;
pub use pipeline::post as pipeline_post;

pub use stage::delete as stage_delete;
pub use stage::move_to as stage_move;
pub use stage::patch as stage_patch;
pub use stage::post as stage_post;

pub use opportunity::delete as opportunity_delete;
pub use opportunity::get as opportunity_get;
pub use opportunity::move_to as opportunity_move;
pub use opportunity::patch as opportunity_patch;
pub use opportunity::post as opportunity_post;

pub use comment::delete as comment_delete;
pub use comment::patch as comment_patch;
pub use comment::post as comment_post;

pub use activity::complete as activity_complete;
pub use activity::delete as activity_delete;
pub use activity::patch as activity_patch;
pub use activity::post as activity_post;
