mod decision;
mod store;
mod traits;

pub use decision::{decide, RouteDecision};
pub use store::BlocklistStore;
pub use traits::BlocklistMatcher;
