//! Provenance merging across branches, loops and calls.

use objsize_oracle::{Harness, scenarios};

#[test]
fn nested_branches() {
    #[scenarios]
    mod test {
        fn check_three_way() {
            let a: [u8; 8];
            let b: [u8; 16];
            let c: [u8; 32];
            let p: *mut u8 = if opaque() != 0 {
                &a[0]
            } else if opaque() != 0 {
                &b[4]
            } else {
                &c[0]
            };
            check!(object_size(p, 0), 32);
            check!(object_size(p, 1), 32);
            check!(object_size(p, 2), 8);
            check!(object_size(p, 3), 8);
        }

        fn check_branch_offsets() {
            let buf: [i32; 10];
            let p: *mut i32 = &buf[0];
            if opaque() != 0 {
                p = p + 2;
            } else {
                p = p + 7;
            }
            check!(object_size(p, 0), 32);
            check!(object_size(p, 2), 12);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.passed, 6);
}

#[test]
fn loops() {
    #[scenarios]
    mod test {
        fn check_loop_untouched() {
            let buf: [u8; 12];
            let p: *mut u8 = &buf[3];
            let n = 0;
            while n < opaque() {
                n += 1;
            }
            check!(object_size(p, 0), 9);
            check!(object_size(p, 2), 9);
        }

        fn check_loop_switch() {
            let a: [u8; 4];
            let b: [u8; 40];
            let p: *mut u8 = &a[0];
            while opaque() != 0 {
                p = &b[0];
            }
            check!(object_size(p, 0), 40);
            check!(object_size(p, 2), 4);
        }

        fn check_loop_variable_index() {
            let buf: [i64; 4];
            let p: *mut i64 = &buf[0];
            for i in 0..4 {
                p = &buf[i];
            }
            check!(object_size(p, 0), 32);
            check!(object_size(p, 2), 0);
            check!(object_size(p, 3), 0);
        }

        fn check_skipped_loop() {
            let buf: [u8; 12];
            let p: *mut u8 = &buf[0];
            for i in 5..5 {
                p = &buf[i];
            }
            check!(object_size(p, 0), 12);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.passed, 8);
}

#[test]
fn loop_fixpoint() {
    #[scenarios]
    mod test {
        fn advance(p: *mut *mut u8) -> i32 {
            *p = *p + 1;
            opaque()
        }

        fn check_pointer_rotation() {
            let a: [u8; 1];
            let b: [u8; 2];
            let c: [u8; 3];
            let d: [u8; 4];
            let e: [u8; 64];
            let p: *mut u8 = &a[0];
            let q: *mut u8 = &b[0];
            let r: *mut u8 = &c[0];
            let s: *mut u8 = &d[0];
            let t: *mut u8 = &e[0];
            while opaque() != 0 {
                p = q;
                q = r;
                r = s;
                s = t;
            }
            check!(object_size(p, 0), 64);
            check!(object_size(p, 2), 1);
        }

        fn check_condition_moves_pointer() {
            let buf: [u8; 16];
            let p: *mut u8 = &buf[0];
            let n = 0;
            while advance(&p) != 0 {
                n += 1;
            }
            check!(object_size(p, 0), 16);
            check!(object_size(p, 2), 0);
        }

        fn check_allocation_per_iteration() {
            let p: *mut u8 = malloc(4) as *mut u8;
            let n = 0;
            while n < opaque() {
                p = malloc(32) as *mut u8;
                n += 1;
            }
            check!(object_size(p, 0), 32);
            check!(object_size(p, 2), 4);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.passed, 6);
}

#[test]
fn calls() {
    #[scenarios]
    mod test {
        fn walk(p: *mut u8, n: i32) -> *mut u8 {
            if n == 0 {
                return p;
            }
            walk(p + 1, n - 1)
        }

        fn either(p: *mut u8, q: *mut u8) -> *mut u8 {
            if opaque() != 0 {
                return p;
            }
            q
        }

        fn check_bounded_recursion() {
            let buf: [u8; 10];
            let p = walk(&buf[0], 3);
            check!(object_size(p, 0), 7);
            check!(object_size(p, 2), 7);
        }

        fn check_returned_merge() {
            let small: [u8; 2];
            let big: [u8; 20];
            let p = either(&small[0], &big[0]);
            check!(object_size(p, 0), 20);
            check!(object_size(p, 2), 2);
        }
    }
    test.check().unwrap();
    let report = Harness::default().run(&test);
    assert!(report.is_success(), "{:?}", report.failures);
}
