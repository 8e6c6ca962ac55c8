pub mod post;
pub mod session;

pub use post::Post;
pub use session::{Credentials, Session};
