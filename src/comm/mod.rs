mod communicator;
mod key;
mod registry;

pub use communicator::Communicator;
pub use key::GroupKey;
pub use registry::CommRegistry;
