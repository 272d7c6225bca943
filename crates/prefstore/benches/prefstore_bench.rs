use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use prefstore::{cached_records, sys_defaults, PreferenceStore, StaticConfig, SysPreference};
use prefstore_core::{Config, RecordEngine};

fn store() -> PreferenceStore<SysPreference> {
    let engine = Arc::new(RecordEngine::in_memory(Config::server()));
    let defaults = sys_defaults(Arc::new(StaticConfig::new())).expect("complete defaults");
    PreferenceStore::new(cached_records(engine), Arc::new(defaults))
}

fn bench_warm_get(c: &mut Criterion) {
    let prefs = store();
    prefs.get_all_preferences().expect("materialize defaults");

    c.bench_function("get_preference_warm", |b| {
        b.iter(|| prefs.get_preference(black_box("bcrypt_strength")).expect("read"))
    });
    c.bench_function("get_boolean_warm", |b| {
        b.iter(|| prefs.get_boolean(black_box("allow_guest_uploads")).expect("read"))
    });
}

fn bench_set(c: &mut Criterion) {
    let prefs = store();
    let mut n = 0u32;
    c.bench_function("set_preference", |b| {
        b.iter(|| {
            n = n.wrapping_add(1);
            prefs.set_preference("bcrypt_strength", f64::from(n % 32)).expect("write")
        })
    });
}

fn bench_get_all(c: &mut Criterion) {
    let prefs = store();
    prefs.get_all_preferences().expect("materialize defaults");
    c.bench_function("get_all_preferences", |b| {
        b.iter(|| prefs.get_all_preferences().expect("read all"))
    });
}

criterion_group!(benches, bench_warm_get, bench_set, bench_get_all);
criterion_main!(benches);
