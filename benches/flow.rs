use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use localizei_cashback::replay::{Attempt, Replayer};
use localizei_cashback::{Amount, FlowConfig, compute_split, parse_payload};

/// Generates payment attempts for benchmarking.
///
/// Pattern per user (repeating):
/// 1. Purchase 100.00 with no redemption (earns cashback)
/// 2. Purchase 30.00 redeeming up to 5.00
/// 3. Purchase with an unreadable QR code
pub struct AttemptGenerator {
    num_users: u32,
    attempts_per_user: u32,
    current_user: u32,
    current_step: u32,
}

impl AttemptGenerator {
    pub fn new(num_users: u32, attempts_per_user: u32) -> Self {
        Self {
            num_users,
            attempts_per_user,
            current_user: 1,
            current_step: 0,
        }
    }
}

impl Iterator for AttemptGenerator {
    type Item = Attempt;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_user > self.num_users {
            return None;
        }

        let user = format!("u{}", self.current_user);
        let attempt = match self.current_step % 3 {
            0 => Attempt {
                user,
                balance: None,
                payload: format!("https://localizei.app/cashback/loja/m{}", self.current_step),
                purchase: Amount::from_scaled(10_000),
                cashback_use: Amount::ZERO,
                percent: None,
            },
            1 => Attempt {
                user,
                balance: None,
                payload: r#"{"type":"LOCALIZEI_MERCHANT_QR","merchantId":"m1","storeId":"s1"}"#
                    .to_string(),
                purchase: Amount::from_scaled(3_000),
                cashback_use: Amount::from_scaled(500),
                percent: None,
            },
            _ => Attempt {
                user,
                balance: None,
                payload: "not a merchant code".to_string(),
                purchase: Amount::from_scaled(1_000),
                cashback_use: Amount::ZERO,
                percent: None,
            },
        };

        self.current_step += 1;

        // Move to next user after attempts_per_user attempts
        if self.current_step >= self.attempts_per_user {
            self.current_step = 0;
            self.current_user += 1;
        }

        Some(attempt)
    }
}

fn bench_split(c: &mut Criterion) {
    c.bench_function("compute_split_grid", |b| {
        b.iter(|| {
            let mut total = Amount::ZERO;
            for purchase in (0..10_000).step_by(97) {
                for balance in (0..5_000).step_by(89) {
                    let split = compute_split(
                        black_box(Amount::from_scaled(purchase)),
                        black_box(Amount::from_scaled(2_500)),
                        black_box(Amount::from_scaled(balance)),
                    );
                    total += split.amount_payable;
                }
            }
            total
        });
    });
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_payload");

    let payloads = [
        (
            "json",
            r#"{"type":"LOCALIZEI_MERCHANT_QR","merchantId":"m1","storeId":"s1"}"#,
        ),
        ("link", "https://localizei.app/cashback/loja/m42?ref=qr"),
        ("invalid", "not json, not a url"),
    ];
    for (label, payload) in payloads {
        group.bench_with_input(BenchmarkId::from_parameter(label), payload, |b, payload| {
            b.iter(|| black_box(parse_payload(black_box(payload))));
        });
    }

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");
    group.sample_size(10);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("failed to build runtime");

    for (users, per_user) in [(10, 100), (100, 10)] {
        let label = format!("{users}u_{per_user}a");
        group.bench_with_input(
            BenchmarkId::from_parameter(&label),
            &(users, per_user),
            |b, &(users, per_user)| {
                b.iter(|| {
                    runtime.block_on(async {
                        let mut replayer = Replayer::new(FlowConfig::default());
                        let attempts = AttemptGenerator::new(users, per_user);
                        replayer.run(tokio_stream::iter(attempts)).await;
                        replayer.outcomes().len()
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_split, bench_parse, bench_replay);
criterion_main!(benches);
