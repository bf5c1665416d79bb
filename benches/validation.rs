use akr::core::autofix::{AutoFixOptions, FileMetadata, auto_fix};
use akr::core::cache::SessionCache;
use akr::core::config::CacheConfig;
use akr::core::document::parse;
use akr::core::schema::{BaselineTemplate, SchemaRegistry};
use akr::core::validate::{Tier, ValidationOptions, validate_phase1};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn document(template: BaselineTemplate, repeat: usize) -> String {
    let mut out = String::from(
        "---\nfeature: FN-1\ndomain: Bench\nlayer: Service\ncomponent: Bench\nstatus: draft\nversion: '1.0'\ncomponentType: Service\npriority: Low\nlastUpdated: 2026-01-01\n---\n# Bench\n",
    );
    for name in template.section_names().iter().rev() {
        out.push_str(&format!("\n## {}\n\n", name));
        for i in 0..repeat {
            out.push_str(&format!("Line {} of {} with `code` and a [link](x).\n", i, name));
        }
        out.push_str("\n```text\n## fenced\n```\n");
    }
    out
}

fn bench_parse_and_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate_phase1");
    let registry = SchemaRegistry::new();
    let opts = ValidationOptions::with_tier(Tier::Tier2);

    for template in BaselineTemplate::ALL {
        let schema = registry.build_schema(template.identifier(), "");
        let content = document(template, 20);
        group.bench_with_input(
            BenchmarkId::from_parameter(template.identifier()),
            &content,
            |b, content| b.iter(|| validate_phase1(&parse(black_box(content)), &schema, &opts)),
        );
    }
    group.finish();
}

fn bench_auto_fix(c: &mut Criterion) {
    let template = BaselineTemplate::LeanBaselineService;
    let schema = SchemaRegistry::new().build_schema(template.identifier(), "");
    let content = document(template, 50);
    let violations = validate_phase1(&parse(&content), &schema, &ValidationOptions::default()).violations;
    let meta = FileMetadata::default();

    c.bench_function("auto_fix_reorder", |b| {
        b.iter(|| auto_fix(black_box(&content), &violations, &meta, &schema, &AutoFixOptions::default()))
    });
}

fn bench_cache_lookup(c: &mut Criterion) {
    let cache = SessionCache::new(&CacheConfig::default());
    let template = BaselineTemplate::LeanBaselineService;
    let schema = SchemaRegistry::new().build_schema(template.identifier(), "");
    let content = document(template, 200);
    let result = validate_phase1(&parse(&content), &schema, &ValidationOptions::default());
    cache.cache_enforcement_result(&content, template.identifier(), Tier::Tier2, &result, None);

    c.bench_function("cache_hit_large_document", |b| {
        b.iter(|| cache.get_enforcement_result(black_box(&content), template.identifier(), Tier::Tier2))
    });
}

criterion_group!(benches, bench_parse_and_validate, bench_auto_fix, bench_cache_lookup);
criterion_main!(benches);
