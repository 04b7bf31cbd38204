pub mod jobs;
pub mod logs_ws;
pub mod rules;
