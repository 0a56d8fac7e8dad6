use crossbeam_channel::{bounded, unbounded};
use dispatch_rs::dispatch;
use dispatch_rs::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn quick_runtime(prefix: &str) -> Runtime {
    let config = Config::builder()
        .parallelism(2)
        .thread_name_prefix(prefix)
        .build()
        .unwrap();
    Runtime::new(config).unwrap()
}

#[test]
fn test_elastic_runs_once_off_thread() {
    let elastic = dispatch_rs::runtime::elastic().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = bounded(1);

    let caller = thread::current().id();
    let r = runs.clone();
    elastic.execute_after(Duration::ZERO, move || {
        r.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(thread::current().id());
    });

    let ran_on = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_ne!(ran_on, caller);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

fn cancel_at_five(dispatcher: Arc<dyn Dispatcher>) {
    let count = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = unbounded();

    let c = count.clone();
    let handle = dispatcher.execute_every(
        Duration::from_millis(10),
        Duration::from_millis(10),
        move || {
            let _ = tx.send(c.fetch_add(1, Ordering::SeqCst) + 1);
        },
    );

    while rx.recv_timeout(Duration::from_secs(2)).unwrap() < 5 {}
    handle.cancel();

    thread::sleep(Duration::from_millis(50));
    let last = count.load(Ordering::SeqCst);
    assert!(last == 5 || last == 6, "ran {} times", last);
}

#[test]
fn test_periodic_cancel_at_five_on_every_backend() {
    let rt = quick_runtime("cancel-five");

    cancel_at_five(rt.main());
    cancel_at_five(rt.elastic());
    cancel_at_five(rt.parallel());
    cancel_at_five(rt.single());

    let pool = ThreadPool::elastic(rt.config()).unwrap();
    cancel_at_five(Arc::new(dispatch::with_pool(pool).unwrap()));

    let timer = Timer::spawn("cancel-five-timer").unwrap();
    cancel_at_five(Arc::new(dispatch::with_timer(timer.clone())));
    timer.shutdown();

    rt.main_loop().quit();
}

#[test]
fn test_run_loop_dispatch_from_foreign_thread() {
    let run_loop = RunLoop::spawn("foreign-post").unwrap();
    let dispatcher = dispatch::with_loop(run_loop.clone());
    let (tx, rx) = bounded(1);

    let poster = thread::spawn(move || {
        let caller = thread::current().id();
        dispatcher.execute(move || {
            let _ = tx.send((thread::current().id(), caller));
        });
    });
    poster.join().unwrap();

    let (ran_on, caller) = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_ne!(ran_on, caller);
    assert_eq!(Some(ran_on), run_loop.thread_id());
    run_loop.quit();
}

#[test]
fn test_host_driven_main_loop() {
    let run_loop = RunLoop::new("host-main");
    let rt = Runtime::with_main_loop(Config::default(), run_loop.clone()).unwrap();
    let (tx, rx) = bounded(1);

    let lp = run_loop.clone();
    rt.main().execute_after(Duration::from_millis(5), move || {
        let _ = tx.send(thread::current().id());
        lp.quit();
    });

    // drive the loop on this thread until the task quits it
    run_loop.run().unwrap();
    assert_eq!(rx.try_recv().unwrap(), thread::current().id());
}

#[test]
fn test_panicking_tick_does_not_stop_series() {
    let rt = quick_runtime("panic-tick");
    let timer = Timer::spawn("panic-tick-timer").unwrap();
    let pool = ThreadPool::single(rt.config()).unwrap();

    let timed_pool: Arc<dyn Dispatcher> = Arc::new(dispatch::with_pool(pool).unwrap());
    let bare_timer: Arc<dyn Dispatcher> = Arc::new(dispatch::with_timer(timer.clone()));

    for dispatcher in [rt.main(), rt.elastic(), rt.single(), timed_pool, bare_timer] {
        let count = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = unbounded();

        let c = count.clone();
        let handle = dispatcher.execute_every(Duration::ZERO, Duration::from_millis(5), move || {
            let tick = c.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(tick);
            if tick == 2 {
                panic!("tick 2 fails");
            }
        });

        while rx.recv_timeout(Duration::from_secs(2)).unwrap() < 3 {}
        handle.cancel();
    }

    timer.shutdown();
    rt.main_loop().quit();
}

#[test]
fn test_cancel_is_idempotent() {
    let rt = quick_runtime("idempotent");
    let (tx, rx) = bounded(1);

    let done = rt.single().execute(move || {
        let _ = tx.send(());
    });
    rx.recv_timeout(Duration::from_secs(1)).unwrap();

    // cancelling after completion has no effect
    done.cancel();
    done.cancel();

    let runs = Arc::new(AtomicUsize::new(0));
    let r = runs.clone();
    let pending = rt.elastic().execute_after(Duration::from_millis(20), move || {
        r.fetch_add(1, Ordering::SeqCst);
    });
    pending.cancel();
    pending.cancel();
    Cancellable::noop().cancel();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    rt.main_loop().quit();
}

#[test]
fn test_fixed_rate_does_not_drift() {
    let rt = quick_runtime("no-drift");
    let (tx, rx) = unbounded();

    let start = Instant::now();
    let handle = rt.main().execute_every(
        Duration::from_millis(10),
        Duration::from_millis(20),
        move || {
            let _ = tx.send(Instant::now());
            // each body eats most of the period
            thread::sleep(Duration::from_millis(12));
        },
    );

    let ticks: Vec<Instant> = (0..6)
        .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
        .collect();
    handle.cancel();

    for (n, fired) in ticks.iter().enumerate() {
        let deadline = start + Duration::from_millis(10 + 20 * n as u64);
        assert!(*fired >= deadline);
    }
    // with fixed delay the sixth tick would land near 10 + 5 * 32ms
    let last = ticks[5].duration_since(start);
    assert!(last < Duration::from_millis(10 + 5 * 32), "sixth tick at {:?}", last);

    rt.main_loop().quit();
}

#[test]
fn test_single_preserves_order() {
    let rt = quick_runtime("ordered");
    let (tx, rx) = unbounded();

    for i in 0..100 {
        let tx = tx.clone();
        rt.single().execute(move || {
            let _ = tx.send(i);
        });
    }

    let seen: Vec<i32> = (0..100)
        .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
        .collect();
    assert_eq!(seen, (0..100).collect::<Vec<_>>());
    rt.main_loop().quit();
}

#[test]
fn test_registry_accessors_share_backends() {
    let rt = dispatch_rs::runtime::runtime().unwrap();
    assert!(Arc::ptr_eq(&rt, &dispatch_rs::runtime::runtime().unwrap()));
    assert!(matches!(
        dispatch_rs::init(),
        Err(Error::AlreadyInitialized)
    ));

    let (tx, rx) = bounded(2);
    let a = dispatch_rs::runtime::new_single().unwrap();
    let tx2 = tx.clone();
    a.execute(move || {
        let _ = tx2.send(thread::current().name().map(str::to_string));
    });
    dispatch_rs::runtime::main().unwrap().execute(move || {
        let _ = tx.send(thread::current().name().map(str::to_string));
    });

    let mut names: Vec<String> = (0..2)
        .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, vec!["dispatch-main".to_string(), "dispatch-single-0".to_string()]);
}
