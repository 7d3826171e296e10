pub mod amount;
pub mod headers;
pub mod matcher;
pub mod normalize;
pub mod reconcile;
pub mod splitter;

pub use amount::parse_amount;
pub use matcher::{run_pass, PassSpec};
pub use reconcile::ReconcileService;
pub use splitter::{build_mapping, SplitOutput, SplitterService};
