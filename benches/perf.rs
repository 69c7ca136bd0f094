use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use chrono::NaiveDate;

use mlb_oracle::assemble::FeatureBuilder;
use mlb_oracle::encode::{ModelSchema, encode};
use mlb_oracle::fake_provider::FakeStatsProvider;
use mlb_oracle::ids::Resolver;
use mlb_oracle::lgbm::Booster;
use mlb_oracle::predict::{PredictConfig, rng_for, simulate};
use mlb_oracle::schema::named_order;
use mlb_oracle::stats_api::StatsProvider;

/// 44 inputs, 60 depth-three trees over assorted columns.
fn synthetic_model() -> String {
    let mut out = String::from(
        "tree\nversion=v3\nnum_class=1\nmax_feature_idx=43\nobjective=binary sigmoid:1\n\n",
    );
    for t in 0..60usize {
        let f = |k: usize| (t * 7 + k * 11) % 44;
        out.push_str(&format!(
            "Tree={t}\nnum_leaves=4\nsplit_feature={} {} {}\nthreshold=0 -0.5 0.5\n\
             decision_type=10 10 10\nleft_child=1 -1 -3\nright_child=2 -2 -4\n\
             leaf_value=-0.02 0.01 -0.01 0.02\nshrinkage=0.1\n\n",
            f(0),
            f(1),
            f(2)
        ));
    }
    out.push_str("end of trees\n");
    out
}

fn bench_pipeline(c: &mut Criterion) {
    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let provider = FakeStatsProvider::demo(date, 11);
    let resolver = Resolver::from_teams(provider.teams().unwrap()).unwrap();
    let builder = FeatureBuilder::new(&provider, &resolver, None);
    let game = provider.schedule_on(date).unwrap().remove(0);
    let record = builder.build(&game).unwrap();

    let columns = named_order("order1").unwrap();
    let scaled: Vec<_> = columns.iter().map(|f| (*f, 0.5, 2.0)).collect();
    let schema = ModelSchema::new("bench", columns, &scaled).unwrap();
    let booster = Booster::parse(&synthetic_model()).unwrap();
    let vector = encode(&record, &schema).unwrap();

    c.bench_function("assemble_demo_game", |b| {
        b.iter(|| builder.build(black_box(&game)).unwrap())
    });

    c.bench_function("encode_order1", |b| {
        b.iter(|| encode(black_box(&record), black_box(&schema)).unwrap())
    });

    c.bench_function("booster_predict", |b| {
        b.iter(|| booster.predict(black_box(vector.as_slice())))
    });

    let cfg = PredictConfig {
        simulations: 10,
        perturbation: 0.001,
        seed: Some(3),
    };
    c.bench_function("simulate_10_passes", |b| {
        b.iter(|| {
            let mut rng = rng_for(&cfg, game.game_id);
            simulate(&booster, black_box(&vector), &cfg, &mut rng)
        })
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
