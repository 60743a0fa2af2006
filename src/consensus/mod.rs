pub mod acceptor;
pub mod behavior;
pub mod codec;
pub mod coordinator;
pub mod message;
pub mod peers;
pub mod proposer;
pub mod status;

pub use acceptor::*;
pub use behavior::*;
pub use codec::*;
pub use coordinator::*;
pub use message::*;
pub use peers::*;
pub use proposer::*;
pub use status::*;
