//! Quote Engine
//!
//! Prices a route by chaining single-hop quotes: each hop's quoted output is
//! the next hop's input. Any failed or empty hop makes the whole route
//! unavailable for this cycle.

use alloy::primitives::U256;
use tracing::debug;

use crate::chain::ChainClient;
use crate::error::QuoteUnavailable;
use crate::route::{Quote, TradeRoute};

pub async fn price_route(
    client: &dyn ChainClient,
    route: &TradeRoute,
) -> Result<Quote, QuoteUnavailable> {
    let mut amount = route.amount_in;
    let mut hops = Vec::with_capacity(route.hops.len());

    for (i, hop) in route.hops.iter().enumerate() {
        let hop_no = i + 1;
        let hop_quote = client
            .quote(hop, amount)
            .await
            .map_err(|e| QuoteUnavailable::CallFailed {
                hop: hop_no,
                reason: format!("{:#}", e),
            })?;

        if hop_quote.amount_out == U256::ZERO {
            return Err(QuoteUnavailable::ZeroOutput { hop: hop_no });
        }

        amount = hop_quote.amount_out;
        hops.push(hop_quote);
    }

    let quote = Quote::new(hops);

    debug!(
        route = %route.label(),
        amount_in = %route.amount_in,
        amount_out = %amount,
        quoter_gas = quote.total_gas_estimate,
        "route priced"
    );

    Ok(quote)
}
