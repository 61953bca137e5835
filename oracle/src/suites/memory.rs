use objsize_scenario_derive::scenarios_crate;

use crate::syntax::Suite;

/// Pointers stored in and loaded back from memory.
pub fn memory() -> Suite {
    #[scenarios_crate]
    mod memory {
        struct Holder {
            ptr: *mut u8,
            len: usize,
        }

        union Pun {
            ptr: *mut u8,
            bits: usize,
        }

        static mut SLOT: *mut u8 = 0 as *mut u8;

        fn set_out(out: *mut *mut u8, target: *mut u8) {
            *out = target;
        }

        fn tail(p: *mut i32, n: i32) -> *mut i32 {
            p + n
        }

        fn check_pointer_in_array() {
            let buf: [u8; 20];
            let slots: [*mut u8; 3];
            slots[1] = &buf[4];
            check!(object_size(slots[1], 0), 16);
            let i = opaque();
            slots[i] = &buf[0];
            check!(object_size(slots[1], 0), 20);
            check!(object_size(slots[1], 2), 16);
        }

        fn check_pointer_in_struct() {
            let buf: [u8; 12];
            let h: Holder;
            h.ptr = &buf[2];
            h.len = 10;
            check!(object_size(h.ptr, 0), 10);
            let hp: *mut Holder = &h;
            check!(object_size(hp.ptr, 0), 10);
            check!(object_size((*hp).ptr, 2), 10);
            check!(object_size(&hp.len, 0), size_of::<Holder>() - offset_of!(Holder, len));
        }

        fn check_out_parameter() {
            let buf: [u8; 7];
            let p: *mut u8 = null();
            set_out(&p, &buf[0]);
            check!(object_size(p, 0), 7);
        }

        fn check_memcpy_pointer() {
            let buf: [u8; 9];
            let src: *mut u8 = &buf[1];
            let dst: *mut u8 = null();
            memcpy(&dst, &src, size_of::<*mut u8>());
            check!(object_size(dst, 0), 8);
        }

        fn check_struct_copy() {
            let buf: [u8; 30];
            let a: Holder;
            a.ptr = &buf[10];
            let b: Holder = a;
            check!(object_size(b.ptr, 0), 20);
            a.ptr = &buf[29];
            check!(object_size(b.ptr, 0), 20);
        }

        fn check_union_punning() {
            let buf: [u8; 5];
            let u: Pun;
            u.ptr = &buf[1];
            let back = u.bits as *mut u8;
            check!(object_size(back, 0), 4);
        }

        fn check_argument_aliasing() {
            let a: [i32; 10];
            let t = tail(&a[0], 3);
            check!(object_size(t, 0), 7 * size_of::<i32>());
            let u = tail(t, 2);
            check!(object_size(u, 2), 5 * size_of::<i32>());
        }

        fn check_realloc_keeps_contents() {
            let buf: [u8; 6];
            let table = malloc(size_of::<*mut u8>() * 2) as *mut *mut u8;
            table[0] = &buf[2];
            let bigger = realloc(table, size_of::<*mut u8>() * 4) as *mut *mut u8;
            check!(object_size(bigger[0], 0), 4);
            check!(object_size(bigger, 0), size_of::<*mut u8>() * 4);
        }

        fn check_calloc_slots_start_null() {
            let slots = calloc(4, size_of::<*mut u8>()) as *mut *mut u8;
            check!(object_size(slots[2], 0), -1);
            check!(object_size(slots[2], 3), 0);
        }

        fn check_global_pointer() {
            check!(object_size(SLOT, 0), -1);
            let buf: [u8; 3];
            SLOT = &buf[0];
            check!(object_size(SLOT, 0), 3);
        }
    }
    memory
}
