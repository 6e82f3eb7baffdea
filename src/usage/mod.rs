mod ledger;

pub use ledger::{UsageLedger, UsageSnapshot};
