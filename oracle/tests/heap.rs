//! Heap regions: sizes from allocator arguments, reallocation and release.

use objsize_oracle::{Config, FreedPolicy, Harness, scenarios};

fn stale() -> Config {
    Config { freed: FreedPolicy::Stale, ..Config::default() }
}

#[test]
fn allocation_sizes() {
    #[scenarios]
    mod test {
        fn check_sizes() {
            let n = 6;
            let p = malloc(n * size_of::<i64>()) as *mut i64;
            check!(object_size(p, 0), 48);
            check!(object_size(p + n - 1, 2), 8);
            check!(object_size(p + n, 0), 0);
            let q = calloc(n, 3);
            check!(object_size(q, 1), 18);
            let z = malloc(0);
            check!(object_size(z, 0), 0);
            check!(object_size(z, 3), 0);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.passed, 6);
}

#[test]
fn freed_region_follows_policy() {
    #[scenarios]
    mod test {
        fn check_freed() {
            let p = malloc(12);
            let alias = (p as *mut u8) + 2;
            free(p);
            check!(object_size(p, 0), 12);
            check!(object_size(alias, 2), 10);
        }
    }
    test.check().unwrap();

    let report = Harness::new(stale()).run(&test);
    assert!(report.is_success(), "{:?}", report.failures);

    let report = Harness::default().quiet().run(&test);
    assert_eq!(report.passed, 0);
    assert_eq!(report.failed(), 2);
}

#[test]
fn realloc_releases_the_old_region() {
    #[scenarios]
    mod test {
        fn check_realloc_old() {
            let p = malloc(8);
            let q = realloc(p, 100);
            check!(object_size(q, 0), 100);
            check!(object_size(p, 0), -1);
            check!(object_size(p, 3), 0);
        }

        fn check_realloc_unknown() {
            let p = malloc(8);
            let q = realloc(p, opaque());
            check!(object_size(q, 0), -1);
            check!(object_size(q, 2), -1);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.passed, 5);
}

#[test]
fn conditionally_freed() {
    #[scenarios]
    mod test {
        fn check_maybe_freed() {
            let p = malloc(16);
            if opaque() != 0 {
                free(p);
            }
            check!(object_size(p, 0), 16);
        }
    }
    test.check().unwrap();
    assert!(Harness::new(stale()).run(&test).is_success());
    assert_eq!(Harness::default().quiet().run(&test).failed(), 1);
}

#[test]
fn alloc_size_annotations() {
    #[scenarios]
    mod test {
        unsafe extern "C" {
            #[alloc_size(2)]
            fn arena_alloc(arena: *mut void, bytes: usize) -> *mut void;
            #[alloc_size(1, 2)]
            fn arena_array(count: usize, elem: usize) -> *mut u8;
        }

        fn check_arena() {
            let p = arena_alloc(null(), 33);
            check!(object_size(p, 0), 33);
            let a = arena_array(5, size_of::<i16>());
            check!(object_size(a + 1, 0), 9);
            let u = arena_alloc(null(), opaque());
            check!(object_size(u, 3), 0);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
}

#[test]
fn alloc_size_out_of_range() {
    #[scenarios]
    mod test {
        unsafe extern "C" {
            #[alloc_size(3)]
            fn broken(n: usize) -> *mut void;
        }

        fn check_broken() {
            let p = broken(4);
            check!(object_size(p, 0), 4);
        }
    }
    assert!(test.check().is_err());
}
