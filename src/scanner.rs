//! Opportunity Scanner
//!
//! Builds every candidate route for a chain, prices each one, filters on
//! profitability and returns the survivors ranked by net USD profit. Strategies
//! are independent: a route that cannot be quoted is counted and skipped.

use alloy::primitives::U256;
use eyre::{Result, WrapErr};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::amounts::decimal_to_units;
use crate::chain::ChainClient;
use crate::config::{ChainConfig, ChainKey, EngineConfig, StrategyFlags};
use crate::error::QuoteUnavailable;
use crate::profit::{evaluate, GasModel, Opportunity};
use crate::quote::price_route;
use crate::route::{Strategy, TradeRoute};

/// Outcome of one scan pass over one chain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub chain: ChainKey,
    /// Accepted opportunities, best first.
    pub opportunities: Vec<Opportunity>,
    pub routes_evaluated: usize,
    /// Routes that could not be priced this cycle, per strategy.
    pub quote_skips: BTreeMap<Strategy, u64>,
    /// Priced routes that failed the profit thresholds.
    pub rejected: usize,
    pub latency_ms: u64,
}

impl ScanReport {
    pub fn best(&self) -> Option<&Opportunity> {
        self.opportunities.first()
    }
}

pub struct OpportunityScanner {
    config: Arc<EngineConfig>,
    gas: GasModel,
}

impl OpportunityScanner {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        let gas = GasModel::new(config.gas);
        Self { config, gas }
    }

    /// Candidate routes for `chain`, in a fixed order.
    pub fn build_routes(&self, chain: &ChainConfig, flags: &StrategyFlags) -> Vec<TradeRoute> {
        let tokens = &chain.tokens;
        let weth = tokens.wrapped_native;
        let sizes: Vec<U256> = self.config.trade_sizes_wei(weth.decimals);
        let tiers = &chain.dex.fee_tiers;
        let mut routes = Vec::new();

        if flags.is_enabled(Strategy::IntraDex) {
            for size in &sizes {
                for fee_out in tiers {
                    for fee_back in tiers {
                        if fee_out == fee_back {
                            continue;
                        }
                        routes.push(TradeRoute::intra_dex(
                            chain.key,
                            weth,
                            tokens.stable,
                            *fee_out,
                            *fee_back,
                            *size,
                        ));
                    }
                }
            }
        }

        if flags.is_enabled(Strategy::Triangular) {
            if let Some(third) = tokens.third {
                for size in &sizes {
                    routes.push(TradeRoute::triangular(
                        chain.key,
                        [weth, tokens.stable, third],
                        chain.dex.triangular_fees,
                        *size,
                    ));
                }
            }
        }

        if flags.is_enabled(Strategy::Stablecoin) {
            if let Some(bridged) = tokens.bridged_stable {
                if let Ok(size) = decimal_to_units(self.config.stable_trade_size, tokens.stable.decimals) {
                    routes.push(TradeRoute::stablecoin(
                        chain.key,
                        tokens.stable,
                        bridged,
                        chain.dex.stable_fees,
                        size,
                    ));
                }
            }
        }

        routes
    }

    /// Scan the client's chain. Errors only when the chain-wide inputs (gas
    /// price, native price) cannot be read.
    pub async fn scan(&self, client: &dyn ChainClient, flags: &StrategyFlags) -> Result<ScanReport> {
        let start = Instant::now();
        let chain = client.chain();
        let routes = self.build_routes(chain, flags);

        let gas_price = client
            .fee_price()
            .await
            .wrap_err_with(|| format!("{}: gas price unavailable", chain.key))?;
        let native_price = client
            .native_price_usd()
            .await
            .wrap_err_with(|| format!("{}: native price unavailable", chain.key))?;

        let gas_by_strategy: BTreeMap<Strategy, U256> = Strategy::ALL
            .iter()
            .map(|s| (*s, self.gas.estimate(*s, gas_price)))
            .collect();

        let priced: Vec<(TradeRoute, Result<_, QuoteUnavailable>)> = stream::iter(routes)
            .map(|route| async move {
                let quote = price_route(client, &route).await;
                (route, quote)
            })
            .buffered(self.config.quote_concurrency)
            .collect()
            .await;

        let mut report = ScanReport {
            chain: chain.key,
            opportunities: Vec::new(),
            routes_evaluated: priced.len(),
            quote_skips: BTreeMap::new(),
            rejected: 0,
            latency_ms: 0,
        };

        for (route, quote) in priced {
            let quote = match quote {
                Ok(q) => q,
                Err(e) => {
                    debug!(chain = %chain.key, route = %route.label(), "quote unavailable: {}", e);
                    *report.quote_skips.entry(route.strategy).or_insert(0) += 1;
                    continue;
                }
            };

            let gas = gas_by_strategy
                .get(&route.strategy)
                .copied()
                .unwrap_or(U256::ZERO);
            match evaluate(
                &route,
                &quote,
                gas,
                native_price,
                self.config.min_profit_usd,
                self.config.min_profit_bps,
            ) {
                Some(opp) => report.opportunities.push(opp),
                None => report.rejected += 1,
            }
        }

        report
            .opportunities
            .sort_by(|a, b| b.net_profit_usd.cmp(&a.net_profit_usd));
        report.latency_ms = start.elapsed().as_millis() as u64;

        if let Some(best) = report.best() {
            info!(
                chain = %chain.key,
                found = report.opportunities.len(),
                best = %best.route.label(),
                net_usd = %best.net_profit_usd,
                spread_bps = best.spread_bps,
                "opportunities found"
            );
        } else {
            debug!(
                chain = %chain.key,
                routes = report.routes_evaluated,
                rejected = report.rejected,
                "no opportunities"
            );
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GasUnits;
    use crate::testing::{eth, test_chain, usd6, usdc, usdce, usdt, weth, MockChainClient, QuoteRule};
    use rust_decimal_macros::dec;

    /// Gas price at which the intra-dex estimate is exactly 0.00004 ETH.
    const POINT_ONE_GWEI: u128 = 100_000_000;

    fn scanner(sizes: &[&str]) -> OpportunityScanner {
        let mut config = EngineConfig::default();
        config.trade_sizes = sizes.iter().map(|s| s.parse().unwrap()).collect();
        // 400k units, no buffer
        config.gas.units = GasUnits { wrap: 40_000, approve: 30_000, swap: 150_000 };
        config.gas.buffer = dec!(1);
        OpportunityScanner::new(Arc::new(config))
    }

    fn intra_only() -> StrategyFlags {
        let mut flags = StrategyFlags::none();
        flags.intra_dex = true;
        flags
    }

    #[test]
    fn test_builds_ordered_fee_pairs_per_size() {
        let scanner = scanner(&["0.005", "0.01"]);
        let chain = test_chain(ChainKey::Arbitrum);
        let routes = scanner.build_routes(&chain, &intra_only());

        // 2 sizes * (500->3000, 3000->500)
        assert_eq!(routes.len(), 4);
        assert_eq!(routes[0].hops[0].fee, 500);
        assert_eq!(routes[0].hops[1].fee, 3000);
        assert_eq!(routes[1].hops[0].fee, 3000);
        assert_eq!(routes[2].amount_in, eth("0.01"));
    }

    #[test]
    fn test_strategy_flags_gate_route_building() {
        let scanner = scanner(&["0.01"]);
        let chain = test_chain(ChainKey::Arbitrum);

        let all = scanner.build_routes(&chain, &StrategyFlags::default());
        assert_eq!(all.iter().filter(|r| r.strategy == Strategy::IntraDex).count(), 2);
        assert_eq!(all.iter().filter(|r| r.strategy == Strategy::Triangular).count(), 1);
        assert_eq!(all.iter().filter(|r| r.strategy == Strategy::Stablecoin).count(), 1);

        let stable = all.iter().find(|r| r.strategy == Strategy::Stablecoin).unwrap();
        assert_eq!(stable.amount_in, usd6("100"));

        assert!(scanner.build_routes(&chain, &StrategyFlags::none()).is_empty());

        let mut no_third = chain.clone();
        no_third.tokens.third = None;
        no_third.tokens.bridged_stable = None;
        let routes = scanner.build_routes(&no_third, &StrategyFlags::default());
        assert!(routes.iter().all(|r| r.strategy == Strategy::IntraDex));
    }

    #[tokio::test]
    async fn test_thin_spread_scenario_returns_nothing() {
        let scanner = scanner(&["0.01"]);
        let client = MockChainClient::arbitrum();
        client.set_gas_price(POINT_ONE_GWEI);
        client.set_native_price(dec!(3500));
        client.set_quote(weth(), usdc(), 500, QuoteRule::Fixed(usd6("21.10")));
        client.set_quote(usdc(), weth(), 3000, QuoteRule::Fixed(eth("0.01003")));

        let report = scanner.scan(&client, &intra_only()).await.unwrap();
        assert!(report.opportunities.is_empty());
        assert_eq!(report.rejected, 1);
        // 3000 -> 500 has no pools configured
        assert_eq!(report.quote_skips.get(&Strategy::IntraDex), Some(&1));
    }

    #[tokio::test]
    async fn test_wide_spread_scenario_ranks_first() {
        let scanner = scanner(&["0.01"]);
        let client = MockChainClient::arbitrum();
        client.set_gas_price(POINT_ONE_GWEI);
        client.set_quote(weth(), usdc(), 500, QuoteRule::Fixed(usd6("21.10")));
        client.set_quote(usdc(), weth(), 3000, QuoteRule::Fixed(eth("0.0102")));
        client.set_quote(weth(), usdc(), 3000, QuoteRule::Fixed(usd6("21.00")));
        client.set_quote(usdc(), weth(), 500, QuoteRule::Fixed(eth("0.0101")));

        let report = scanner.scan(&client, &intra_only()).await.unwrap();
        assert_eq!(report.opportunities.len(), 2);

        let best = report.best().unwrap();
        assert_eq!(best.route.hops[0].fee, 500);
        assert_eq!(best.spread_bps, 200);
        assert_eq!(best.net_profit_usd, dec!(0.56));
        assert!(report.opportunities[1].net_profit_usd < best.net_profit_usd);

        for opp in &report.opportunities {
            assert_eq!(opp.net_profit_usd, opp.gross_profit_usd - opp.gas_cost_usd);
            assert!(opp.net_profit_usd >= dec!(0.10));
            assert!(opp.spread_bps >= 10);
        }
    }

    #[tokio::test]
    async fn test_triangular_failure_does_not_block_other_strategies() {
        let scanner = scanner(&["0.01"]);
        let client = MockChainClient::arbitrum();
        client.set_gas_price(1);
        client.set_quote(weth(), usdc(), 500, QuoteRule::Fixed(usd6("21.10")));
        client.set_quote(usdc(), weth(), 3000, QuoteRule::Fixed(eth("0.0102")));
        client.set_quote(usdc(), usdt(), 100, QuoteRule::Fail);
        client.set_quote(usdc(), usdce(), 100, QuoteRule::Fixed(usd6("100.3")));
        client.set_quote(usdce(), usdc(), 500, QuoteRule::Fixed(usd6("100.5")));

        let report = scanner.scan(&client, &StrategyFlags::default()).await.unwrap();

        assert_eq!(report.quote_skips.get(&Strategy::Triangular), Some(&1));
        let strategies: Vec<Strategy> = report.opportunities.iter().map(|o| o.route.strategy).collect();
        assert!(strategies.contains(&Strategy::IntraDex));
        assert!(strategies.contains(&Strategy::Stablecoin));
    }

    #[tokio::test]
    async fn test_scan_is_idempotent_for_fixed_quotes() {
        let scanner = scanner(&["0.005", "0.01", "0.02"]);
        let client = MockChainClient::arbitrum();
        client.set_gas_price(1_000_000);
        client.set_quote(weth(), usdc(), 500, QuoteRule::rate(2110, 1_000_000_000_000));
        client.set_quote(usdc(), weth(), 3000, QuoteRule::rate(1_000_000_000_000, 2070));
        client.set_quote(weth(), usdc(), 3000, QuoteRule::rate(2100, 1_000_000_000_000));
        client.set_quote(usdc(), weth(), 500, QuoteRule::rate(1_000_000_000_000, 2080));

        let economics = |report: &ScanReport| -> Vec<_> {
            report
                .opportunities
                .iter()
                .map(|o| (o.route.clone(), o.quote.clone(), o.net_profit_usd, o.spread_bps))
                .collect()
        };

        let first = scanner.scan(&client, &intra_only()).await.unwrap();
        let second = scanner.scan(&client, &intra_only()).await.unwrap();
        assert!(!first.opportunities.is_empty());
        assert_eq!(economics(&first), economics(&second));
    }

    #[tokio::test]
    async fn test_unreadable_gas_price_is_scan_error() {
        let scanner = scanner(&["0.01"]);
        let client = MockChainClient::arbitrum();
        client.set_reads_fail(true);
        assert!(scanner.scan(&client, &intra_only()).await.is_err());
    }
}
