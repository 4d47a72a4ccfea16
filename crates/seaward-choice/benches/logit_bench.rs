use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use seaward_choice::{ExtractorConfig, LogitConfig, LogitRowConfig};
use seaward_core::{Day, DestinationStrategy, FisherRecord, GridMap, GroupId, StateView};
use seaward_geo::{MapDiscretization, RepresentativePolicy, SquaresDiscretizer};
use std::sync::Arc;
use std::time::Duration;

fn bench_select_destination(c: &mut Criterion) {
    let mut group = c.benchmark_group("logit_select");
    let samples: usize = std::env::var("SEAWARD_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);
    group.sample_size(samples);
    group.measurement_time(Duration::from_secs(5));

    for splits in [3_u32, 9, 19] {
        let map = GridMap::new(60, 60, 1.0).expect("map");
        let partition = Arc::new(
            MapDiscretization::discretize(
                &SquaresDiscretizer::new(splits, splits),
                &map,
                RepresentativePolicy::Centroid,
            )
            .expect("partition"),
        );
        let rows = (0..partition.number_of_groups())
            .map(|group| LogitRowConfig {
                group: GroupId(group),
                coefficients: vec![0.5, -0.02, 0.3],
                extractors: Some(vec![
                    ExtractorConfig::Intercept { value: 1.0 },
                    ExtractorConfig::DistanceFromHome,
                    ExtractorConfig::Habit {
                        period_days: 30,
                        mode: Default::default(),
                    },
                ]),
            })
            .collect();
        let config = LogitConfig {
            rows,
            ..LogitConfig::default()
        };
        let fisher = FisherRecord::new(map.id_at(0, 0));
        group.bench_function(format!("groups{}", partition.number_of_groups()), |b| {
            b.iter_batched(
                || {
                    (
                        config.build(Arc::clone(&partition)).expect("strategy"),
                        SmallRng::seed_from_u64(0x5EA),
                    )
                },
                |(mut strategy, mut rng)| {
                    let state = StateView::new(&map, Day(0));
                    for _ in 0..64 {
                        std::hint::black_box(strategy.select_destination(
                            &fisher, &state, &mut rng,
                        ));
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_select_destination);
criterion_main!(benches);
