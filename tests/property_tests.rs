//! Property-based tests for the kernel.
//!
//! A fixed set of probe tasks records every delivery. Random sequences of
//! posts, interrupt brackets and ceiling locks are replayed against the
//! kernel, and after every operation the delivery log is compared with the
//! log of accepted posts.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Mutex;

use proptest::collection::vec;
use proptest::prelude::*;
use sst_kernel::{Error, Event, Kernel, TaskConfig, TaskHandler, IDLE_PRIORITY, MAX_PRIO};

const PRIOS: [u8; 5] = [1, 3, 4, 7, 12];
const QUEUE_LEN: usize = 4;

/// A post request: target task index, plus an optional follow-up target
/// the receiving handler posts to when it runs.
type PostSpec = (usize, Option<usize>);

#[derive(Debug, Clone)]
enum Op {
    Post(PostSpec),
    Isr { level: u8, posts: Vec<PostSpec> },
    Ceiling { ceiling: usize, posts: Vec<PostSpec> },
}

fn arb_post() -> impl Strategy<Value = PostSpec> {
    (0..PRIOS.len(), proptest::option::of(0..PRIOS.len()))
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_post().prop_map(Op::Post),
        1 => (20u8..40, vec(arb_post(), 0..6)).prop_map(|(level, posts)| Op::Isr { level, posts }),
        1 => (0..PRIOS.len(), vec(arb_post(), 0..6))
            .prop_map(|(ceiling, posts)| Op::Ceiling { ceiling, posts }),
    ]
}

#[derive(Default)]
struct Harness {
    next_id: AtomicU16,
    accepted: Mutex<Vec<(u8, u16)>>,
    delivered: Mutex<Vec<(u8, u16)>>,
    /// Priorities of the handlers currently on the call stack.
    nesting: Mutex<Vec<u8>>,
}

impl Harness {
    /// Post a uniquely-tagged event; keep it in `accepted` unless rejected.
    fn post(&self, kernel: &Kernel<'_>, priority: u8, follow: Option<u8>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Recorded first: the post may dispatch before it returns.
        self.accepted.lock().unwrap().push((priority, id));
        match kernel.post(priority, u16::from(follow.unwrap_or(0)), id) {
            Ok(()) => {}
            Err(Error::QueueFull(p)) => {
                assert_eq!(p, priority);
                self.accepted.lock().unwrap().retain(|&(_, i)| i != id);
            }
            Err(other) => panic!("unexpected post error: {other}"),
        }
    }

    fn post_spec(&self, kernel: &Kernel<'_>, (task, follow): PostSpec) {
        self.post(kernel, PRIOS[task], follow.map(|f| PRIOS[f]));
    }

    fn delivered_len(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

struct Probe<'h> {
    harness: &'h Harness,
    priority: u8,
}

impl TaskHandler for Probe<'_> {
    fn handle(&self, kernel: &Kernel<'_>, event: Event) {
        let h = self.harness;
        assert_eq!(kernel.current_priority(), self.priority);
        {
            let mut nesting = h.nesting.lock().unwrap();
            if let Some(&outer) = nesting.last() {
                assert!(
                    self.priority > outer,
                    "priority {} nested inside {}",
                    self.priority,
                    outer
                );
            }
            nesting.push(self.priority);
        }
        assert_ready_set_consistent(kernel);

        h.delivered.lock().unwrap().push((self.priority, event.param));
        if event.signal != 0 {
            h.post(kernel, event.signal as u8, None);
        }

        assert_eq!(kernel.current_priority(), self.priority);
        h.nesting.lock().unwrap().pop();
    }
}

fn assert_ready_set_consistent(kernel: &Kernel<'_>) {
    let ready = kernel.ready_set();
    for p in 0..MAX_PRIO {
        let queued = kernel.queue_len(p).is_some_and(|n| n > 0);
        assert_eq!(ready.contains(p), queued, "ready bit {} out of sync", p);
    }
}

fn ids_for(log: &[(u8, u16)], priority: u8) -> Vec<u16> {
    log.iter()
        .filter(|&&(p, _)| p == priority)
        .map(|&(_, id)| id)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn accepted_events_are_delivered_once_in_fifo_order(ops in vec(arb_op(), 1..40)) {
        let harness = Harness::default();
        let probes: Vec<Probe<'_>> = PRIOS
            .iter()
            .map(|&priority| Probe { harness: &harness, priority })
            .collect();
        let mut storage = [[Event::EMPTY; QUEUE_LEN]; PRIOS.len()];
        let kernel = Kernel::new();
        for (probe, queue) in probes.iter().zip(storage.iter_mut()) {
            kernel.register(probe, TaskConfig::new(probe.priority), queue).unwrap();
        }
        kernel.start().unwrap();

        for op in ops {
            match op {
                Op::Post(spec) => harness.post_spec(&kernel, spec),
                Op::Isr { level, posts } => {
                    let before = harness.delivered_len();
                    let saved = kernel.isr_entry(level);
                    for spec in posts {
                        harness.post_spec(&kernel, spec);
                    }
                    // Every task is below the interrupt level.
                    prop_assert_eq!(harness.delivered_len(), before);
                    assert_ready_set_consistent(&kernel);
                    kernel.isr_exit(saved);
                }
                Op::Ceiling { ceiling, posts } => {
                    let ceiling = PRIOS[ceiling];
                    let before = harness.delivered_len();
                    let saved = kernel.mutex_lock(ceiling).unwrap();
                    prop_assert_eq!(saved, IDLE_PRIORITY);
                    for spec in posts {
                        harness.post_spec(&kernel, spec);
                    }
                    {
                        let delivered = harness.delivered.lock().unwrap();
                        prop_assert!(delivered[before..].iter().all(|&(p, _)| p > ceiling));
                    }
                    kernel.mutex_unlock(saved);
                }
            }

            prop_assert!(kernel.ready_set().is_empty());
            prop_assert_eq!(kernel.current_priority(), IDLE_PRIORITY);
            prop_assert!(harness.nesting.lock().unwrap().is_empty());

            let accepted = harness.accepted.lock().unwrap();
            let delivered = harness.delivered.lock().unwrap();
            prop_assert_eq!(accepted.len(), delivered.len());
            for &p in &PRIOS {
                prop_assert_eq!(ids_for(&accepted, p), ids_for(&delivered, p));
            }
        }
    }

    #[test]
    fn overflow_never_disturbs_queued_events(extra in 1usize..10, capacity_log2 in 0u32..4) {
        let capacity = 1usize << capacity_log2;
        let delivered = Mutex::new(Vec::new());
        let task = sst_kernel::from_fn(|_, e: Event| delivered.lock().unwrap().push(e.param));
        let mut storage = vec![Event::EMPTY; capacity];
        let kernel = Kernel::new();
        kernel.register(&task, TaskConfig::new(2), &mut storage).unwrap();

        for i in 0..capacity {
            kernel.post(2, 0, i as u16).unwrap();
        }
        for i in 0..extra {
            prop_assert_eq!(kernel.post(2, 0, (capacity + i) as u16), Err(Error::QueueFull(2)));
            prop_assert_eq!(kernel.queue_len(2), Some(capacity));
            prop_assert!(kernel.ready_set().contains(2));
        }

        kernel.start().unwrap();
        let expected: Vec<u16> = (0..capacity as u16).collect();
        prop_assert_eq!(&*delivered.lock().unwrap(), &expected);
    }
}
