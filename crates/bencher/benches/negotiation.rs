use bencher::{TestCase, TestRequest};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use micro_rest::converter::{ConverterRegistry, JsonConverter, Tuple3, Tuple3Converter};
use micro_rest::router::Arguments;
use micro_rest::{EntityType, parse_accept};
use std::hint::black_box;

static ANY: TestRequest = TestRequest::new("/", "*/*");
static BROWSER: TestRequest =
    TestRequest::new("/", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8");
static WEIGHTED: TestRequest = TestRequest::new("/", "text/plain;q=0.3, application/json;q=0.7, text/*;q=0.5");

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("accept_any", ANY),
        TestCase::normal("accept_browser", BROWSER),
        TestCase::normal("accept_weighted", WEIGHTED),
    ]
}

fn registry() -> ConverterRegistry {
    ConverterRegistry::builder()
        .with_default_formats()
        .and_then(|builder| builder.with_scalars())
        .and_then(|builder| builder.register(JsonConverter::<i64>::new()))
        .and_then(|builder| builder.register(Tuple3Converter::new()))
        .expect("registry should be valid")
        .build()
}

fn benchmark_lookup(criterion: &mut Criterion) {
    let registry = registry();
    let entity_type = EntityType::of::<i64>();
    let mut group = criterion.benchmark_group("lookup_for_encode");

    for case in create_test_cases() {
        let accept = parse_accept(case.request().accept()).expect("accept header should be valid");
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &accept, |b, accept| {
            b.iter(|| black_box(registry.lookup_for_encode(&entity_type, black_box(accept)).is_ok()));
        });
    }

    group.finish();
}

fn benchmark_encode_tuple(criterion: &mut Criterion) {
    let registry = registry();
    let entity_type = Tuple3::entity_type(EntityType::of::<i64>(), EntityType::of::<String>(), EntityType::of::<i64>());
    let tuple = Tuple3::new(42_i64, String::from("answer"), -1_i64);
    let accept = parse_accept(WEIGHTED.accept()).expect("accept header should be valid");

    criterion.bench_function("encode_tuple3", |b| {
        b.iter(|| black_box(registry.encode(&tuple, &entity_type, &accept, Arguments::empty()).is_ok()));
    });
}

criterion_group!(negotiation, benchmark_lookup, benchmark_encode_tuple);
criterion_main!(negotiation);
