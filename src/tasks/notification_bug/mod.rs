mod task;

pub use task::{task, SLUG};
