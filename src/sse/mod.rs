pub mod models;
pub use models::*;

mod broadcaster;
pub use broadcaster::*;

pub mod relay;

mod live_stream;
pub use live_stream::live_stream;
