pub mod invoice;
pub mod ledger;
pub mod result;
pub mod workbook;

pub use invoice::{BucketSummary, Destination, InvoiceMapping, MappingEntry, PageAssignment, SplitReport};
pub use ledger::{LedgerRow, MatchState};
pub use result::{AccountCounts, MatchPair, Notification, PassKind, PassOutcome, ReconcileReport};
pub use workbook::{Cell, CellValue, Fill, Sheet, Workbook};
