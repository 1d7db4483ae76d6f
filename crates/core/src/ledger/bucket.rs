//! Bucket aggregates. Every field is re-fetched, never accumulated.

use alloy::primitives::Address;
use indexer_chain::ChainStateReader;
use tracing::debug;

use crate::error::Result;
use crate::ids::bucket_id;
use crate::store::{Bucket, Store};

pub fn load_or_create_bucket(store: &Store, pool: Address, index: u32) -> (Bucket, bool) {
    store
        .buckets
        .load_or_create(&bucket_id(pool, index), || Bucket::new(pool, index))
}

/// Overwrite the bucket's aggregates with `bucketInfo`.
pub async fn refresh_bucket<R: ChainStateReader + ?Sized>(
    bucket: &mut Bucket,
    reader: &R,
) -> Result<()> {
    let info = reader.bucket_info(bucket.pool, bucket.index).await?;
    bucket.price = info.price;
    bucket.deposit = info.quote_tokens;
    bucket.collateral = info.collateral;
    bucket.lpb = info.bucket_lp;
    bucket.exchange_rate = info.exchange_rate;

    debug!(
        pool = %bucket.pool,
        index = bucket.index,
        deposit = %bucket.deposit,
        lpb = %bucket.lpb,
        "Bucket refreshed"
    );
    Ok(())
}

/// Load (or create) and refresh in one step.
pub async fn load_refreshed<R: ChainStateReader + ?Sized>(
    store: &Store,
    reader: &R,
    pool: Address,
    index: u32,
) -> Result<Bucket> {
    let (mut bucket, _) = load_or_create_bucket(store, pool, index);
    refresh_bucket(&mut bucket, reader).await?;
    Ok(bucket)
}
