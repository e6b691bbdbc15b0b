use bencher::{TestCase, TestRequest};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::Method;
use micro_rest::router::{self, Route, Router, Signature};
use std::hint::black_box;

static SHOW: TestRequest = TestRequest::new("/resource1/42", "*/*");
static ITEMS: TestRequest = TestRequest::new("/resource1/42/items;lang=en?page=2&size=10", "*/*");
static MISSING: TestRequest = TestRequest::new("/resource1/42/unknown", "*/*");

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("show_small_table", SHOW),
        TestCase::large("show_large_table", SHOW),
        TestCase::normal("items_with_parameters", ITEMS),
        TestCase::normal("route_not_found", MISSING),
    ]
}

fn route_table(size: usize) -> Router<usize> {
    let routes = (0..size / 4).flat_map(|i| {
        let base = format!("/resource{i}");
        [
            router::get(Signature::builder().path(&base).build().unwrap(), i * 4),
            router::get(Signature::builder().path(&base).variable::<u64>("id").build().unwrap(), i * 4 + 1),
            router::put(Signature::builder().path(&base).variable::<u64>("id").build().unwrap(), i * 4 + 2),
            router::get(
                Signature::builder()
                    .path(&base)
                    .variable::<u64>("id")
                    .segment("items")
                    .optional_matrix::<String>("lang")
                    .query::<u32>("page")
                    .optional_query::<u32>("size")
                    .build()
                    .unwrap(),
                i * 4 + 3,
            ),
        ]
    });
    Router::load(routes.collect::<Vec<Route<usize>>>()).expect("generated route table should be valid")
}

fn benchmark_resolve(criterion: &mut Criterion) {
    let test_cases = create_test_cases();
    let mut group = criterion.benchmark_group("router_resolve");

    for case in test_cases {
        let router = route_table(case.table_size());
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| black_box(router.resolve(&Method::GET, black_box(case.request().target()))));
        });
    }

    group.finish();
}

criterion_group!(resolve, benchmark_resolve);
criterion_main!(resolve);
