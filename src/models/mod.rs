pub mod enums;
pub mod patient;
pub mod visit;
pub mod vaccination;
pub mod attachment;
pub mod chat_session;
pub mod scan_result;

pub use enums::*;
pub use patient::*;
pub use visit::*;
pub use vaccination::*;
pub use attachment::*;
pub use chat_session::*;
pub use scan_result::*;
