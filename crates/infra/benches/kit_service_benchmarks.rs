use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use labops_catalogs::{Agreement, Exam, ServiceLocation};
use labops_core::{ExamId, LocationId};
use labops_infra::catalog::{InMemoryCatalog, ReferenceCatalogs};
use labops_infra::{InMemoryKitStore, KitService};
use labops_kits::{CreateKit, KitExamInput, KitLocationInput, UpdateKit};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("failed to build tokio runtime")
}

fn service_with_catalog(exams: usize) -> (KitService<InMemoryKitStore>, Vec<ExamId>, LocationId) {
    let exam_ids: Vec<ExamId> = (0..exams).map(|_| ExamId::new()).collect();
    let location_id = LocationId::new();
    let catalogs = ReferenceCatalogs::new(
        Arc::new(InMemoryCatalog::with_entries(
            exam_ids.iter().map(|id| Exam::new(*id, "EX", "Exam")),
        )),
        Arc::new(InMemoryCatalog::with_entries([ServiceLocation::new(
            location_id,
            "Main unit",
        )])),
        Arc::new(InMemoryCatalog::<Agreement>::new()),
    );
    (
        KitService::new(InMemoryKitStore::new(), catalogs),
        exam_ids,
        location_id,
    )
}

fn kit_input(code: String, exam_ids: &[ExamId], location_id: LocationId) -> CreateKit {
    let mut input = CreateKit::new(code, "Benchmark kit");
    input.exams = Some(exam_ids.iter().map(|id| KitExamInput::new(*id)).collect());
    input.locations = Some(vec![KitLocationInput::new(location_id)]);
    input
}

/// Create path: validation, code check, transaction, N referenced exams.
fn bench_create(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("kit_create");

    for exams in [1usize, 10, 50] {
        group.throughput(Throughput::Elements(exams as u64));
        group.bench_with_input(BenchmarkId::from_parameter(exams), &exams, |b, &exams| {
            let (service, exam_ids, location_id) = service_with_catalog(exams);
            let mut seq = 0u64;
            b.iter(|| {
                seq += 1;
                let input = kit_input(format!("BENCH-{seq}"), &exam_ids, location_id);
                black_box(rt.block_on(service.create(input)).expect("create failed"));
            });
        });
    }

    group.finish();
}

/// Update path: full replace of the exam collection.
fn bench_update_replace(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("kit_update_replace");

    for exams in [1usize, 10, 50] {
        group.throughput(Throughput::Elements(exams as u64));
        group.bench_with_input(BenchmarkId::from_parameter(exams), &exams, |b, &exams| {
            let (service, exam_ids, location_id) = service_with_catalog(exams);
            let kit = rt
                .block_on(service.create(kit_input("BENCH".to_string(), &exam_ids, location_id)))
                .expect("create failed");
            let update = UpdateKit {
                exams: Some(exam_ids.iter().rev().map(|id| KitExamInput::new(*id)).collect()),
                ..UpdateKit::default()
            };
            b.iter(|| {
                black_box(
                    rt.block_on(service.update(kit.id(), update.clone()))
                        .expect("update failed"),
                );
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create, bench_update_replace);
criterion_main!(benches);
