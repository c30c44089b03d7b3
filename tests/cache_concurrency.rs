// this_file: tests/cache_concurrency.rs
//! Multi-threaded behaviour of the cache context

use glyphcache::{
    glyph_id, identity::string_id_from_str, CacheContext, GlyphLookup, RenderTrait,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

type Ctx = CacheContext<Vec<u8>, Vec<u32>>;

#[test]
fn test_reserving_thread_publishes_to_waiter() {
    let ctx = Arc::new(Ctx::with_capacity(16));
    let id = glyph_id(RenderTrait::from_bits(0x1234), 65, false);

    assert!(ctx.lookup_glyph(id).is_pending());

    let waiter = {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || ctx.lookup_glyph(id))
    };
    // Give the waiter time to block on the pending slot.
    thread::sleep(Duration::from_millis(50));
    assert!(ctx.store_glyph(id, Some(vec![1, 2, 3])).unwrap());

    match waiter.join().unwrap() {
        GlyphLookup::Ready(glyph) => assert_eq!(glyph.as_slice(), &[1, 2, 3]),
        other => panic!("expected a ready glyph, got pending={}", other.is_pending()),
    }
}

#[test]
fn test_failure_marker_releases_waiters() {
    let ctx = Arc::new(Ctx::with_capacity(16));
    let id = glyph_id(RenderTrait::from_bits(9), 7, true);
    assert!(ctx.lookup_glyph(id).is_pending());

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || ctx.lookup_glyph(id))
        })
        .collect();
    thread::sleep(Duration::from_millis(20));
    assert!(!ctx.store_glyph(id, None).unwrap());

    for waiter in waiters {
        assert!(matches!(waiter.join().unwrap(), GlyphLookup::Failed));
    }
    assert!(matches!(ctx.lookup_glyph(id), GlyphLookup::Failed));
}

#[test]
fn test_many_threads_render_each_glyph_once() {
    const THREADS: usize = 8;
    const GLYPHS: u32 = 64;

    let ctx = Arc::new(Ctx::with_capacity(16));
    let renders = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));
    let render_trait = RenderTrait::from_bits(42);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let renders = Arc::clone(&renders);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for index in 0..GLYPHS {
                    let id = glyph_id(render_trait, index, true);
                    let glyph = ctx
                        .glyph_or_render(id, || {
                            renders.fetch_add(1, Ordering::SeqCst);
                            Ok(vec![index as u8])
                        })
                        .ready()
                        .expect("glyph rendered");
                    assert_eq!(glyph[0], index as u8);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(renders.load(Ordering::SeqCst), GLYPHS as usize);
    let stats = ctx.stats().glyphs;
    assert_eq!(stats.entries, GLYPHS as usize);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.misses, u64::from(GLYPHS));
}

#[test]
fn test_concurrent_run_stores_keep_one_winner() {
    const THREADS: usize = 6;

    let ctx = Arc::new(Ctx::with_capacity(4));
    let sid = string_id_from_str("shared", false);
    let t0 = RenderTrait::from_bits(1);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|n| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ctx.store_glyph_run(sid, t0, vec![n as u32]).is_ok()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(ctx.stats().glyph_runs.runs, 1);
}

#[test]
fn test_readers_survive_concurrent_eviction() {
    let ctx = Arc::new(Ctx::with_capacity(2));
    let t0 = RenderTrait::from_bits(5);
    let keep = string_id_from_str("keep", false);
    ctx.store_glyph_run(keep, t0, vec![1, 2, 3]).unwrap();
    let held = ctx.lookup_glyph_run(keep, t0).unwrap();

    let writer = {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || {
            for n in 0..500u32 {
                let sid = string_id_from_str(&format!("churn-{n}"), false);
                ctx.store_glyph_run(sid, t0, vec![n]).unwrap();
            }
        })
    };
    writer.join().unwrap();

    assert!(ctx.lookup_glyph_run(keep, t0).is_none());
    assert_eq!(held.as_slice(), &[1, 2, 3]);
    let stats = ctx.stats().glyph_runs;
    assert_eq!(stats.strings, 2);
    assert_eq!(stats.evictions, 499);
}

#[test]
fn test_two_threads_racing_for_an_absent_glyph() {
    let ctx = Arc::new(Ctx::with_capacity(4));
    let id = glyph_id(RenderTrait::from_bits(77), 0x41, false);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let reserved = ctx.lookup_glyph(id).is_pending();
                if reserved {
                    assert!(ctx.store_glyph(id, Some(vec![0xAB])).unwrap());
                }
                let glyph = ctx.lookup_glyph(id).ready().expect("glyph ready");
                (reserved, glyph)
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|(reserved, _)| *reserved).count(), 1);
    assert!(Arc::ptr_eq(&results[0].1, &results[1].1));
    assert_eq!(results[0].1.as_slice(), &[0xAB]);
}
