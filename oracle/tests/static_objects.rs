//! Objects with automatic storage and their C layouts.

use objsize_oracle::syntax::layout::Target;
use objsize_oracle::{Config, Harness, scenarios};

#[test]
fn nested_aggregates() {
    #[scenarios]
    mod test {
        struct Inner {
            tag: u8,
            data: [i32; 3],
        }

        struct Outer {
            flag: bool,
            inner: Inner,
            tail: [u8; 5],
        }

        fn check_nested() {
            let o: Outer;
            check!(size_of::<Inner>(), 16);
            check!(size_of::<Outer>(), 28);
            check!(object_size(&o, 0), 28);
            check!(object_size(&o.inner, 0), 24);
            check!(object_size(&o.inner.data[1], 0), 16);
            check!(object_size(&o.tail[4], 0), 4);
            check!(object_size(&o.tail[4], 1), 4);
            check!(object_size(&o.tail[4], 3), 4);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.passed, 8);
}

#[test]
fn union_of_arrays() {
    #[scenarios]
    mod test {
        union Storage {
            bytes: [u8; 13],
            words: [u32; 2],
        }

        fn check_union() {
            let s: Storage;
            check!(object_size(&s, 0), 16);
            check!(object_size(&s.bytes[12], 0), 4);
            check!(object_size(&s.words[1], 0), 12);
        }
    }
    test.check().unwrap();
    assert!(Harness::default().run(&test).is_success());
}

#[test]
fn i686_layout() {
    #[scenarios]
    mod test {
        struct ShortDouble {
            s: i16,
            d: f64,
        }

        fn check_layout() {
            let a: [ShortDouble; 3];
            check!(object_size(a, 0), 36);
            check!(object_size(&a[0].d, 0), 32);
            let p: *mut u8;
            check!(object_size(&p, 0), 4);
            let ld: LongDouble;
            check!(object_size(&ld, 0), 12);
            let n: usize;
            check!(object_size(&n, 0), 4);
        }
    }
    test.check().unwrap();

    let config = Config { target: Target::I686, ..Config::default() };
    let report = Harness::new(config).quiet().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);

    // The same expectations do not hold for x86_64.
    let report = Harness::default().quiet().run(&test);
    assert_eq!(report.failed(), 5);
}

#[test]
fn string_buffers() {
    #[scenarios]
    mod test {
        fn check_char_array() {
            let name: [u8; 32] = "scenario";
            check!(object_size(name, 0), 32);
            check!(object_size(&name[8], 0), 24);
            let copy = strdup(name);
            check!(object_size(copy, 0), 9);
            let prefix = strndup(&name[2], 4);
            check!(object_size(prefix, 0), 5);
        }
    }
    test.check().unwrap();
    assert!(Harness::default().run(&test).is_success());
}
