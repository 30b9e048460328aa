//! Property tests over random price paths.

mod common;

use common::*;
use proptest::prelude::*;
use robo::domain::backtest::{run_backtest, EngineConfig};
use robo::domain::metrics::compute_max_drawdown;
use robo::domain::risk::RiskConfig;
use robo::domain::strategy::{create_strategy, ParameterSet, Strategy as TradingStrategy};
use robo::domain::sweep::{parameter_combinations, CancelToken, NullObserver, ParamRange, Sweeper};

fn strategies() -> Vec<Box<dyn TradingStrategy>> {
    let sets = [
        (
            "sma_crossover",
            ParameterSet::new().with("short_window", 3.0).with("long_window", 8.0),
        ),
        (
            "rsi",
            ParameterSet::new()
                .with("period", 5.0)
                .with("oversold", 30.0)
                .with("overbought", 70.0),
        ),
        (
            "macd",
            ParameterSet::new()
                .with("fast_period", 3.0)
                .with("slow_period", 7.0)
                .with("signal_period", 4.0),
        ),
        (
            "bollinger_bands",
            ParameterSet::new().with("period", 6.0).with("std_dev", 1.5),
        ),
        (
            "ema_cross",
            ParameterSet::new()
                .with("fast", 3.0)
                .with("slow", 8.0)
                .with("trend_period", 12.0)
                .with("trend_enabled", 1.0),
        ),
        (
            "rsi_trend",
            ParameterSet::new()
                .with("period", 5.0)
                .with("oversold", 35.0)
                .with("overbought", 65.0)
                .with("trend_period", 12.0)
                .with("trend_enabled", 1.0),
        ),
    ];
    sets.iter()
        .map(|(name, params)| create_strategy(name, params).unwrap())
        .collect()
}

fn price_path() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.05f64..0.05, 1..150).prop_map(|moves| {
        let mut price = 100.0;
        moves
            .into_iter()
            .map(|m| {
                price *= 1.0 + m;
                price
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn signals_cover_every_bar(closes in price_path()) {
        let bars = bars_from_closes(&closes);
        for strategy in strategies() {
            let signals = strategy.generate_signals(&bars);
            prop_assert_eq!(signals.len(), bars.len());
            prop_assert!(signals.iter().all(|s| (-1..=1).contains(&s.as_i8())));
        }
    }

    #[test]
    fn signals_never_look_ahead(closes in price_path(), cut in 0.0f64..1.0) {
        let bars = bars_from_closes(&closes);
        let k = ((bars.len() as f64) * cut) as usize;
        for strategy in strategies() {
            let full = strategy.generate_signals(&bars);
            let prefix = strategy.generate_signals(&bars[..k]);
            prop_assert_eq!(&prefix[..], &full[..k], "{}", strategy.name());
        }
    }

    #[test]
    fn drawdown_is_never_positive(equity in prop::collection::vec(1.0f64..1e6, 0..200)) {
        prop_assert!(compute_max_drawdown(&equity) <= 0.0);
    }

    #[test]
    fn rising_equity_has_no_drawdown(start in 1.0f64..1e4, steps in prop::collection::vec(0.0f64..10.0, 0..100)) {
        let mut equity = vec![start];
        for step in steps {
            let last = *equity.last().unwrap();
            equity.push(last + step);
        }
        prop_assert_eq!(compute_max_drawdown(&equity), 0.0);
    }

    #[test]
    fn capital_stays_non_negative(closes in price_path(), commission in 0.0f64..0.01) {
        let data = series("PROP", &closes);
        let engine = EngineConfig::signal(10_000.0, commission);
        for strategy in strategies() {
            let result = run_backtest(strategy.as_ref(), &data, &engine, &RiskConfig::full_capital()).unwrap();
            prop_assert!(result.metrics.final_capital >= 0.0);
            prop_assert!(result.metrics.max_drawdown <= 0.0);
        }
    }

    #[test]
    fn higher_commission_never_helps(closes in price_path(), low in 0.0f64..0.005, extra in 0.0f64..0.005) {
        let data = series("PROP", &closes);
        let cheap = EngineConfig::signal(10_000.0, low);
        let dear = EngineConfig::signal(10_000.0, low + extra);
        let risk = RiskConfig::full_capital();
        for strategy in strategies() {
            let a = run_backtest(strategy.as_ref(), &data, &cheap, &risk).unwrap();
            let b = run_backtest(strategy.as_ref(), &data, &dear, &risk).unwrap();
            prop_assert!(b.metrics.total_return <= a.metrics.total_return + 1e-9, "{}", strategy.name());
        }
    }

    #[test]
    fn sweep_size_is_grid_times_symbols(
        shorts in prop::collection::btree_set(2u32..6, 1..4),
        longs in prop::collection::btree_set(8u32..14, 1..3),
        symbols in 1usize..4,
    ) {
        let ranges = vec![
            ParamRange::new("short_window", shorts.iter().map(|v| *v as f64).collect()),
            ParamRange::new("long_window", longs.iter().map(|v| *v as f64).collect()),
        ];
        let data: Vec<SymbolSeries> = (0..symbols)
            .map(|i| series(&format!("S{}", i), &rising(40, 50.0 + i as f64, 0.5)))
            .collect();

        let mut sweeper = Sweeper::signal_mode(10_000.0, 0.001);
        let added = sweeper
            .sweep("sma_crossover", &ranges, &data, &NullObserver, &CancelToken::new())
            .unwrap();
        prop_assert_eq!(added, parameter_combinations(&ranges).len() * symbols);
        prop_assert_eq!(added, shorts.len() * longs.len() * symbols);
    }
}
