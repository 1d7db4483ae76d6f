//! Shared token records.

use alloy::primitives::Address;
use indexer_chain::ChainStateReader;
use tracing::debug;

use crate::error::Result;
use crate::ids::address_id;
use crate::store::{Store, Token};

/// Create the token on first sight, then count one more pool using it.
pub async fn link_token<R: ChainStateReader + ?Sized>(
    store: &mut Store,
    reader: &R,
    address: Address,
    is_nft: bool,
) -> Result<Token> {
    let id = address_id(address);
    let mut token = match store.tokens.load(&id) {
        Some(token) => token,
        None => {
            let info = reader.token_info(address).await?;
            debug!(token = %address, symbol = %info.symbol, is_nft, "Token created");
            Token {
                id,
                address,
                name: info.name,
                symbol: info.symbol,
                // collections report a count, not a scaled amount
                decimals: if is_nft { 0 } else { info.decimals },
                is_nft,
                total_supply: info.total_supply,
                pool_count: 0,
                tx_count: 0,
            }
        }
    };

    token.pool_count += 1;
    store.tokens.save(token.clone());
    Ok(token)
}
