pub mod advisory;
pub mod notification;
pub mod practitioner;
pub mod prediction;
pub mod record;
pub mod response;
pub mod risk;

pub use advisory::*;
pub use notification::*;
pub use practitioner::*;
pub use prediction::*;
pub use record::*;
pub use response::*;
pub use risk::*;
