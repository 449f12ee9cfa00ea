mod ledger;
mod member;
mod movement;
mod roster;

pub use ledger::*;
pub use member::*;
pub use movement::*;
pub use roster::*;
