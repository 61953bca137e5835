use objsize_scenario_derive::scenarios_crate;

use crate::syntax::Suite;

/// Heap allocators, custom `alloc_size` allocators, globals and thread-local storage.
pub fn allocation() -> Suite {
    #[scenarios_crate]
    mod allocation {
        unsafe extern "C" {
            #[alloc_size(1)]
            fn pool_alloc(n: usize) -> *mut void;
            #[alloc_size(2, 3)]
            fn pool_calloc(pool: i32, count: usize, size: usize) -> *mut void;
            fn mystery() -> *mut void;
        }

        static BUFFER: [i32; 2] = [0; 2];

        #[thread_local]
        static TLS: i32 = 0;

        fn check_malloc() {
            let p = malloc(10);
            check!(object_size(p, 0), 10);
            check!(object_size(p, 2), 10);
            check!(object_size((p as *mut u8) + 4, 0), 6);
            check!(object_size((p as *mut u8) + 4, 3), 6);
            free(p);
        }

        fn check_calloc() {
            let p = calloc(4, size_of::<i32>()) as *mut i32;
            check!(object_size(p, 0), 4 * size_of::<i32>());
            check!(object_size(&p[1], 0), 3 * size_of::<i32>());
            check!(object_size(p + 3, 2), size_of::<i32>());
        }

        fn check_new_array() {
            let a = malloc(3 * size_of::<f32>()) as *mut f32;
            check!(object_size(a, 0), 3 * size_of::<f32>());
        }

        fn check_realloc() {
            let p = malloc(8);
            let q = realloc(p, 32);
            check!(object_size(q, 0), 32);
            check!(object_size(q, 3), 32);
            let r = realloc(null(), 5);
            check!(object_size(r, 0), 5);
        }

        fn check_aligned_alloc() {
            let p = aligned_alloc(16, 64);
            check!(object_size(p, 0), 64);
            check!(object_size(p, 2), 64);
        }

        fn check_alloca() {
            let p = alloca(24);
            check!(object_size(p, 0), 24);
            check!(object_size((p as *mut u8) + 20, 0), 4);
        }

        fn check_strdup() {
            let s = strdup("hello");
            check!(object_size(s, 0), 6);
            let t = strndup("hello", 3);
            check!(object_size(t, 0), 4);
            let u = strndup("hi", 8);
            check!(object_size(u, 2), 3);

            let buf: [u8; 16] = "abc";
            let d = strdup(buf);
            check!(object_size(d, 0), 4);
            let e = strdup(&buf[1]);
            check!(object_size(e, 0), 3);
        }

        fn check_string_literal() {
            let s = "object";
            check!(object_size(s, 0), 7);
            check!(object_size(s + 6, 0), 1);
        }

        fn check_custom_allocator() {
            let p = pool_alloc(40);
            check!(object_size(p, 0), 40);
            let q = pool_calloc(7, 3, 8);
            check!(object_size(q, 1), 24);
            check!(object_size(q, 2), 24);
        }

        fn check_unannotated_allocator() {
            let r = mystery();
            check!(object_size(r, 0), -1);
            check!(object_size(r, 1), -1);
            check!(object_size(r, 2), -1);
            check!(object_size(r, 3), 0);
        }

        fn check_unknown_size() {
            let p = malloc(opaque());
            check!(object_size(p, 0), -1);
            check!(object_size(p, 3), 0);
        }

        fn check_nullptr() {
            check!(object_size(null(), 0), -1);
            check!(object_size(null(), 2), -1);
            check!(object_size(null(), 3), 0);
        }

        fn check_placement() {
            let d: f64;
            let mem = &d as *mut void as *mut f64;
            check!(object_size(mem, 0), size_of::<f64>());
        }

        fn check_tls() {
            check!(object_size(&TLS, 0), size_of::<i32>());
        }

        fn check_global() {
            check!(object_size(&BUFFER, 0), 2 * size_of::<i32>());
            check!(object_size(&BUFFER[1], 0), size_of::<i32>());
        }

        fn check_heap_or_global() {
            let mem: *mut i32;
            if opaque() != 0 {
                mem = malloc(size_of::<i32>()) as *mut i32;
            } else {
                mem = &BUFFER[0];
            }
            check!(object_size(mem, 0), size_of::<i32>() * max(2, 1));
            check!(object_size(mem, 2), size_of::<i32>() * min(2, 1));
        }

        // Compilers keep reporting the allocation size after `free`.
        #[ignore]
        fn check_use_after_free() {
            let p = malloc(16);
            free(p);
            check!(object_size(p, 0), 16);
            check!(object_size(p, 2), 16);
        }
    }
    allocation
}
