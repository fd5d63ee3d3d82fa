use anyhow::{Result, anyhow};
use autoscale_cuckoo_filter::CuckooFilter;
use futures::StreamExt;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::sync::RwLock;

/// Expected enrolled-tag count and false-positive rate.
/// A shop has at most a few dozen workers; headroom is cheap.
const FILTER_CAPACITY: usize = 10_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Fast negative check for RFID tags: a scan of a tag that was never
/// enrolled skips the database entirely. False positives fall through to
/// the worker lookup, which stays authoritative.
static RFID_FILTER: Lazy<RwLock<CuckooFilter<String>>> = Lazy::new(|| {
    RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE))
});

/// Canonical form of an RFID tag: trimmed, uppercase. Applied everywhere a
/// tag crosses into the system — enrollment writes, scans, and this filter —
/// so the filter and the workers table never disagree about a tag.
#[inline]
pub fn canonical(tag: &str) -> String {
    tag.trim().to_uppercase()
}

/// Check if a tag might be enrolled (false positives possible)
pub fn might_exist(tag: &str) -> bool {
    let tag = canonical(tag);
    RFID_FILTER
        .read()
        .expect("rfid filter poisoned")
        .contains(&tag)
}

/// Insert a tag on enrollment
pub fn insert(tag: &str) {
    let tag = canonical(tag);
    RFID_FILTER
        .write()
        .expect("rfid filter poisoned")
        .add(&tag);
}

/// Remove a tag when a card is unassigned
pub fn remove(tag: &str) {
    let tag = canonical(tag);
    RFID_FILTER
        .write()
        .expect("rfid filter poisoned")
        .remove(&tag);
}

/// Warm up the filter from enrolled workers using streaming + batching
pub async fn warmup_rfid_filter(pool: &MySqlPool, batch_size: usize) -> Result<()> {
    let mut stream = sqlx::query_as::<_, (String,)>(
        "SELECT rfid_tag FROM workers WHERE rfid_tag IS NOT NULL",
    )
    .fetch(pool);

    let mut batch = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = stream.next().await {
        let (tag,) = row.map_err(|e| anyhow!("DB row fetch failed: {}", e))?;

        batch.push(canonical(&tag));
        total += 1;

        if batch.len() == batch_size {
            insert_batch(&batch);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        insert_batch(&batch);
    }

    log::info!("RFID filter warmup complete: {} tags", total);
    Ok(())
}

fn insert_batch(tags: &[String]) {
    let mut filter = RFID_FILTER.write().expect("rfid filter poisoned");

    for tag in tags {
        filter.add(tag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_and_scanned_tags_share_one_canonical_form() {
        // enrollment stores canonical(raw); a padded lowercase scan must
        // reduce to the same string the DB row and the filter both hold
        let stored = canonical("7b3c0aa1");
        assert_eq!(stored, "7B3C0AA1");
        assert_eq!(canonical(" 7B3C0AA1 "), stored);

        insert(&stored);
        assert!(might_exist(" 7b3c0aa1 "));
        remove(&stored);
    }

    #[test]
    fn enrollment_round_trip_is_case_insensitive() {
        insert("04a22f19");
        assert!(might_exist("04A22F19"));
        assert!(might_exist(" 04a22f19 "));

        remove("04A22F19");
        assert!(!might_exist("04a22f19"));
    }
}
