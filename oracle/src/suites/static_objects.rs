use objsize_scenario_derive::scenarios_crate;

use crate::syntax::Suite;

/// Scalars, arrays and aggregates with automatic storage.
pub fn static_objects() -> Suite {
    #[scenarios_crate]
    mod static_objects {
        struct FloatInt {
            f: f32,
            i: i32,
        }

        union FloatShort {
            f: f32,
            s: i16,
        }

        struct CharInt {
            c: u8,
            i: i32,
        }

        struct CharAlignedChar {
            c: u8,
            #[align(4)]
            f: u8,
        }

        struct ShortDouble {
            s: i16,
            d: f64,
        }

        fn check_integers() {
            let b: bool;
            check!(object_size(&b, 0), size_of_val(&b));
            let c: i8;
            check!(object_size(&c, 0), size_of_val(&c));
            let s: i16;
            check!(object_size(&s, 0), size_of_val(&s));
            let i: i32;
            check!(object_size(&i, 0), size_of_val(&i));
            let l: i64;
            check!(object_size(&l, 0), size_of_val(&l));
            let n: usize;
            check!(object_size(&n, 0), size_of_val(&n));
        }

        fn check_floats() {
            let f: f32;
            check!(object_size(&f, 0), size_of_val(&f));
            let d: f64;
            check!(object_size(&d, 0), size_of_val(&d));
            let ld: LongDouble;
            check!(object_size(&ld, 0), size_of_val(&ld));
        }

        fn check_complex() {
            let fc: Complex<f32>;
            check!(object_size(&fc, 0), size_of_val(&fc));
            let dc: Complex<f64>;
            check!(object_size(&dc, 0), size_of_val(&dc));
            let ldc: Complex<LongDouble>;
            check!(object_size(&ldc, 0), size_of_val(&ldc));
        }

        fn check_simple_array() {
            let a: [i32; 3];
            check!(object_size(a, 0), size_of_val(&a));
            check!(object_size(&a[0], 0), size_of_val(&a));
            check!(object_size(&a[1], 0), size_of_val(&a[0]) * 2);
            check!(object_size(&a[2], 0), size_of_val(&a[0]) * 1);
            check!(object_size(&a[3], 0), size_of_val(&a[0]) * 0);
        }

        fn check_simple_struct() {
            let fi: FloatInt;
            check!(object_size(&fi, 0), size_of_val(&fi));
            check!(object_size(&fi.f, 0), size_of_val(&fi) - offset_of!(FloatInt, f));
            check!(object_size(&fi.i, 0), size_of_val(&fi) - offset_of!(FloatInt, i));
        }

        fn check_simple_union() {
            let fs: FloatShort;
            check!(object_size(&fs, 0), size_of_val(&fs));
            check!(object_size(&fs.f, 0), size_of_val(&fs) - offset_of!(FloatShort, f));
            check!(object_size(&fs.s, 0), size_of_val(&fs) - offset_of!(FloatShort, s));
        }

        fn check_padded_struct() {
            let ci: CharInt;
            check!(object_size(&ci, 0), size_of_val(&ci));
            check!(object_size(&ci.c, 0), size_of_val(&ci) - offset_of!(CharInt, c));
            check!(object_size(&ci.i, 0), size_of_val(&ci) - offset_of!(CharInt, i));
        }

        fn check_struct_with_aligned_field() {
            let cf: CharAlignedChar;
            check!(object_size(&cf, 0), size_of_val(&cf));
            check!(object_size(&cf.c, 0), size_of_val(&cf) - offset_of!(CharAlignedChar, c));
            check!(object_size(&cf.f, 0), size_of_val(&cf) - offset_of!(CharAlignedChar, f));
        }

        fn check_array_of_struct() {
            let a: [ShortDouble; 3];
            check!(object_size(a, 0), size_of_val(&a));
            check!(object_size(&a[0], 0), size_of_val(&a));
            check!(object_size(&a[0].s, 0), size_of_val(&a) - offset_of!(ShortDouble, s));
            check!(object_size(&a[0].d, 0), size_of_val(&a) - offset_of!(ShortDouble, d));
            check!(object_size(&a[1], 0), size_of_val(&a[0]) * 2);
            check!(object_size(&a[2], 0), size_of_val(&a[0]) * 1);
            check!(object_size(&a[3], 0), size_of_val(&a[0]) * 0);
        }

        fn check_ifexpr_scalars() {
            let f0: f32;
            let f1: f32;
            let d: f64;
            let ff: *mut void = if rand() & 1 != 0 { &f0 } else { &f1 };
            check!(object_size(ff, 0), max(size_of_val(&f0), size_of_val(&f1)));

            let fd: *mut void = if rand() & 1 != 0 { &f0 as *mut void } else { &d as *mut void };
            check!(object_size(fd, 0), max(size_of_val(&f0), size_of_val(&d)));
            check!(object_size(fd, 1), max(size_of_val(&f0), size_of_val(&d)));
            check!(object_size(fd, 2), min(size_of_val(&f0), size_of_val(&d)));
        }

        fn check_ifexpr_arrays() {
            let a2: [f32; 2];
            let a3: [f32; 3];

            let a: *mut void = if rand() & 1 != 0 { a2 as *mut void } else { a3 as *mut void };
            check!(object_size(a, 0), max(size_of_val(&a2), size_of_val(&a3)));
            check!(object_size(a, 1), max(size_of_val(&a2), size_of_val(&a3)));
            check!(object_size(a, 2), min(size_of_val(&a2), size_of_val(&a3)));

            let a1: *mut void = if rand() & 1 != 0 { &a2[1] as *mut void } else { &a3[1] as *mut void };
            check!(object_size(a1, 0), max(size_of_val(&a2), size_of_val(&a3)) - size_of_val(&a2[0]));
            check!(object_size(a1, 1), max(size_of_val(&a2), size_of_val(&a3)) - size_of_val(&a2[0]));
            check!(object_size(a1, 2), min(size_of_val(&a2), size_of_val(&a3)) - size_of_val(&a2[0]));
        }
    }
    static_objects
}
