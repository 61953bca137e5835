use objsize_scenario_derive::scenarios_crate;

use crate::syntax::Suite;

/// Branches, loops and early returns merging pointer provenance.
pub fn control_flow() -> Suite {
    #[scenarios_crate]
    mod control_flow {
        fn pick(flag: i32, small: *mut u8, big: *mut u8) -> *mut u8 {
            if flag != 0 {
                return small;
            }
            big
        }

        fn check_branch_merge() {
            let small: [u8; 4];
            let big: [u8; 32];
            let p: *mut u8;
            if opaque() != 0 {
                p = &small[0];
            } else {
                p = &big[0];
            }
            check!(object_size(p, 0), 32);
            check!(object_size(p, 1), 32);
            check!(object_size(p, 2), 4);
            check!(object_size(p, 3), 4);
        }

        fn check_known_branch() {
            let small: [u8; 4];
            let big: [u8; 32];
            let p: *mut u8 = if 1 < 2 { &small[0] } else { &big[0] };
            check!(object_size(p, 0), 4);
            check!(object_size(p, 2), 4);
        }

        fn check_one_armed_if() {
            let small: [u8; 4];
            let big: [u8; 32];
            let p: *mut u8 = &big[8];
            if opaque() != 0 {
                p = &small[1];
            }
            check!(object_size(p, 0), 24);
            check!(object_size(p, 2), 3);
        }

        fn check_conditional_null() {
            let buf: [u8; 64];
            let p: *mut u8 = if opaque() != 0 { &buf[0] } else { null() };
            check!(object_size(p, 0), -1);
            check!(object_size(p, 1), -1);
            check!(object_size(p, 2), -1);
            check!(object_size(p, 3), 0);
        }

        fn check_null_test() {
            let buf: [u8; 64];
            let p: *mut u8 = &buf[0];
            let q: *mut u8 = if p == null() { null() } else { &buf[16] };
            check!(object_size(q, 0), 48);
        }

        fn check_loop_advance() {
            let buf: [u8; 16];
            let p: *mut u8 = &buf[0];
            let i = 0;
            while i < opaque() {
                p = p + 1;
                i += 1;
            }
            check!(object_size(p, 0), 16);
            check!(object_size(p, 2), 0);
        }

        fn check_loop_reassign() {
            let a: [u8; 8];
            let b: [u8; 24];
            let p: *mut u8 = &a[0];
            for k in 0..opaque() {
                p = &b[0];
            }
            check!(object_size(p, 0), 24);
            check!(object_size(p, 2), 8);
        }

        fn check_loop_index() {
            let buf: [u32; 4];
            for k in 0..opaque() {
                check!(object_size(&buf[k], 0), size_of_val(&buf));
                check!(object_size(&buf[k], 2), 0);
            }
        }

        fn check_empty_loop() {
            let a: [u8; 8];
            let b: [u8; 24];
            let p = &a[0];
            for k in 0..0 {
                p = &b[0];
            }
            while 0 != 0 {
                p = &b[0];
            }
            check!(object_size(p, 0), 8);
            check!(object_size(p, 2), 8);
        }

        fn check_early_return() {
            let small: [u8; 2];
            let big: [u8; 40];
            let p = pick(opaque(), &small[0], &big[0]);
            check!(object_size(p, 0), 40);
            check!(object_size(p, 2), 2);
            let q = pick(1, &small[0], &big[0]);
            check!(object_size(q, 0), 2);
            let r = pick(0, &small[0], &big[0]);
            check!(object_size(r, 2), 40);
        }
    }
    control_flow
}
