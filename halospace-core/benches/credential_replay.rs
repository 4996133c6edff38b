use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use halospace_core::core_credentials::{credential_id, Credential, SignatureVerifier};
use halospace_core::core_state::SpaceStateMachine;
use halospace_core::test_utils::TestSpace;
use tokio::runtime::Runtime;

/// Genesis sequence followed by `extra` device authorizations
fn space_log(space: &TestSpace, extra: usize) -> Vec<Credential> {
    let mut log = space.genesis_sequence();
    log.extend((0..extra).map(|_| space.authorize_new_device()));
    log
}

fn bench_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("credential_verification");
    let space = TestSpace::new();
    let verifier = SignatureVerifier::new();
    let sequence = space.genesis_sequence();

    group.bench_function("direct_signature", |b| {
        b.iter(|| black_box(verifier.verify_sync(black_box(&sequence[0]))))
    });
    group.bench_function("device_chain", |b| {
        b.iter(|| black_box(verifier.verify_sync(black_box(&sequence[2]))))
    });
    group.bench_function("credential_id", |b| b.iter(|| black_box(credential_id(black_box(&sequence[2])))));

    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("space_replay");
    let runtime = Runtime::new().expect("tokio runtime");
    let space = TestSpace::new();

    for size in [10usize, 100, 500] {
        let log = space_log(&space, size);
        group.throughput(Throughput::Elements(log.len() as u64));

        group.bench_with_input(BenchmarkId::new("verified", size), &log, |b, log| {
            b.iter(|| {
                runtime.block_on(async {
                    let mut machine = SpaceStateMachine::new(space.space_key);
                    for credential in log {
                        machine.process(credential.clone(), space.control_options()).await.unwrap();
                    }
                    black_box(machine.credentials().len())
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("trusted", size), &log, |b, log| {
            b.iter(|| {
                runtime.block_on(async {
                    let mut machine = SpaceStateMachine::new(space.space_key);
                    let options = space.control_options().skip_verification();
                    for credential in log {
                        machine.process(credential.clone(), options).await.unwrap();
                    }
                    black_box(machine.credentials().len())
                })
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_verification, bench_replay);
criterion_main!(benches);
