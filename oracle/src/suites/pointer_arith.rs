use objsize_scenario_derive::scenarios_crate;

use crate::syntax::Suite;

/// Offsets inside, past and before an object, and arguments with side effects.
pub fn pointer_arith() -> Suite {
    #[scenarios_crate]
    mod pointer_arith {
        struct Pair {
            a: [i32; 4],
            b: i64,
        }

        fn next(p: *mut u8) -> *mut u8 {
            p + 1
        }

        fn check_past_the_end() {
            let a: [u8; 5];
            check!(object_size(&a[4], 0), 1);
            check!(object_size(&a[5], 0), 0);
            check!(object_size(&a[7], 0), 0);
            check!(object_size(&a[7], 2), 0);
        }

        fn check_negative_offset() {
            let a: [i32; 4];
            let p: *mut i32 = &a[0];
            let before = p - 1;
            check!(object_size(before, 0), -1);
            check!(object_size(before, 2), -1);
            check!(object_size(before, 3), 0);
            let back = before + 2;
            check!(object_size(back, 0), 3 * size_of::<i32>());
        }

        fn check_variable_index() {
            let a: [i32; 8];
            let i = opaque();
            check!(object_size(&a[i], 0), size_of_val(&a));
            check!(object_size(&a[i], 1), size_of_val(&a));
            check!(object_size(&a[i], 2), 0);
            check!(object_size(&a[i], 3), 0);
        }

        fn check_side_effects() {
            let a: [u8; 10];
            let p: *mut u8 = &a[0];
            check!(object_size({ p += 1; p }, 0), -1);
            check!(object_size({ p += 1; p }, 1), -1);
            check!(object_size({ p += 1; p }, 2), 0);
            check!(object_size({ p += 1; p }, 3), 0);
            check!(object_size(p, 0), 10);
            check!(object_size(next(p), 0), -1);
            check!(object_size(next(p), 2), 0);
        }

        fn check_pure_builtin_argument() {
            let a: [u8; 10];
            check!(object_size(&a[max(2, 3)], 0), 7);
        }

        fn check_pointer_difference() {
            let a: [i64; 6];
            let p: *mut i64 = &a[5];
            let q: *mut i64 = &a[1];
            let n = p - q;
            check!(n, 4);
            check!(object_size(&a[n], 0), 2 * size_of::<i64>());
        }

        fn check_member_array() {
            let s: Pair;
            check!(object_size(&s.a[2], 0), size_of_val(&s) - 2 * size_of::<i32>());
            check!(object_size(&s.a[2], 1), size_of_val(&s) - 2 * size_of::<i32>());
            check!(object_size(&s.b, 0), size_of_val(&s) - offset_of!(Pair, b));
        }

        fn check_void_pointer_arith() {
            let a: [i32; 4];
            let p = &a[0] as *mut void;
            check!(object_size(p + 3, 0), size_of_val(&a) - 3);
        }

        fn check_int_roundtrip() {
            let a: [u8; 12];
            let addr = &a[2] as *mut u8 as usize;
            let back = (addr + 3) as *mut u8;
            check!(object_size(back, 0), 7);
            let forged = 4096 as *mut u8;
            check!(object_size(forged, 0), -1);
            check!(object_size(forged, 3), 0);
            let zero = 0 as *mut u8;
            check!(object_size(zero, 0), -1);
        }
    }
    pointer_arith
}
