use std::sync::Arc;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use identity_link::{
    CandidateResolver, GoldenRecord, HumanName, InMemoryStores, LinkService, LinkSource,
    MatchResult, NameBirthDateComparator, Pid, ResolutionConfig, SourceRecord,
};

fn make_service() -> LinkService {
    let stores = InMemoryStores::new();
    LinkService::new(
        Arc::new(stores.links),
        Arc::new(stores.golden_records),
        &ResolutionConfig::default(),
    )
    .unwrap()
}

fn patient(pid: u64) -> SourceRecord {
    SourceRecord::new(format!("Patient/{pid}"))
        .with_pid(Pid::new(pid))
        .with_name(HumanName::new(format!("Family{}", pid % 64), ["Pat"]))
}

fn seeded_golden(service: &LinkService) -> GoldenRecord {
    service.accessor().create_from_source(&patient(0)).unwrap()
}

fn bench_update_existing(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_link");
    group.throughput(Throughput::Elements(1));

    group.bench_function("existing_pair", |b| {
        b.iter_custom(|iters| {
            // Fresh state per sample so link versions do not accumulate.
            let service = make_service();
            let golden = seeded_golden(&service);
            let source = patient(1);
            service
                .update_link(&source, &golden, MatchResult::Match, LinkSource::Auto)
                .unwrap();

            let start = Instant::now();
            for _ in 0..iters {
                service
                    .update_link(&source, &golden, MatchResult::Match, LinkSource::Auto)
                    .unwrap();
            }
            start.elapsed()
        })
    });

    group.bench_function("first_insert", |b| {
        b.iter_custom(|iters| {
            let service = make_service();
            let golden = seeded_golden(&service);

            let start = Instant::now();
            for pid in 1..=iters {
                service
                    .update_link(&patient(pid), &golden, MatchResult::PossibleMatch, LinkSource::Auto)
                    .unwrap();
            }
            start.elapsed()
        })
    });

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(1));

    group.bench_function("against_64_golden_records", |b| {
        b.iter_custom(|iters| {
            let resolver =
                CandidateResolver::new(Arc::new(make_service()), Arc::new(NameBirthDateComparator));
            for pid in 1..=64 {
                resolver.resolve(&patient(pid)).unwrap();
            }

            let start = Instant::now();
            for pid in 0..iters {
                resolver.resolve(&patient(1_000 + pid)).unwrap();
            }
            start.elapsed()
        })
    });

    group.finish();
}

criterion_group!(link_update, bench_update_existing, bench_resolve);
criterion_main!(link_update);
