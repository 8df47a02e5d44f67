pub use byzantium::ByzantiumVm;
pub use error::Error;
pub use frontier::FrontierVm;
pub use gas_limit::{compute_gas_limit, gas_limit_bounds};
pub use homestead::HomesteadVm;
pub use registry::VmRegistry;
pub use seal::{NoProof, SealEngine};
pub use state::AccountState;
pub use vm::{BlockOutcome, VirtualMachine};

mod byzantium;
mod difficulty;
mod error;
mod frontier;
mod gas_limit;
mod homestead;
mod registry;
mod seal;
mod state;
mod vm;
