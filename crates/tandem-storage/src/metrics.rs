use metrics::counter;

pub const DUAL_STORE_SYNC_TOTAL: &str = "dual_store_sync_total";

pub fn record_sync(outcome: &'static str) {
    counter!(DUAL_STORE_SYNC_TOTAL, "outcome" => outcome).increment(1);
}
