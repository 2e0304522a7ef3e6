mod error;
mod factormeta;
mod factors;
mod graph;
mod incidence;
mod loader;
mod model;
mod options;
mod order;
mod records;
mod subgraph;
mod terminals;
mod topology;
mod units;

pub mod debug;
pub mod math;

pub use error::*;
pub use factormeta::*;
pub use factors::*;
pub use graph::*;
pub use incidence::*;
pub use loader::*;
pub use model::*;
pub use options::*;
pub use order::*;
pub use records::*;
pub use subgraph::*;
pub use terminals::*;
pub use topology::*;
pub use units::*;
